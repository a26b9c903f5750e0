//! Near-duplicate clustering and representative selection
//!
//! Every strategy partitions the pages of a [`SimilarityGraph`] so that each
//! page lands in exactly one cluster. One member per cluster is kept as the
//! representative; the rest are discarded as duplicates.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::corpus::{Corpus, PageKey, PageRecord};
use crate::error::{Result, SiftError};
use crate::similarity::SimilarityGraph;

/// How pages are partitioned into duplicate clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStrategy {
    /// Connected components of the similarity graph; merges transitive chains
    ConnectedComponents,
    /// In document order, each unassigned page claims its unassigned neighbors
    GreedyLeader,
    /// Highest-degree pages first, each claiming its unassigned neighbors
    Star,
    /// A page joins the first cluster whose every member it is similar to
    CompleteLinkage,
}

/// Which member of a multi-page cluster is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Most unique words
    LargestContent,
    /// Highest lexical relevance over the full intelligible corpus
    HighestRelevance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    /// Ascending document order
    pub members: Vec<PageKey>,
    pub representative: PageKey,
}

impl Cluster {
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    /// Members other than the representative
    pub fn discarded(&self) -> impl Iterator<Item = &PageKey> {
        self.members
            .iter()
            .filter(move |k| **k != self.representative)
    }
}

/// Partition of the intelligible pages
#[derive(Debug, Clone, Default, Serialize)]
pub struct Clustering {
    pub clusters: Vec<Cluster>,
}

impl Clustering {
    /// Every page in its own cluster
    pub fn singletons(keys: &[PageKey]) -> Self {
        Self {
            clusters: keys
                .iter()
                .map(|&key| Cluster {
                    members: vec![key],
                    representative: key,
                })
                .collect(),
        }
    }

    /// Representatives in document order
    pub fn representatives(&self) -> Vec<PageKey> {
        let mut keys: Vec<PageKey> = self.clusters.iter().map(|c| c.representative).collect();
        keys.sort();
        keys
    }

    /// Non-representative members in document order
    pub fn discarded(&self) -> Vec<PageKey> {
        let mut keys: Vec<PageKey> = self
            .clusters
            .iter()
            .flat_map(|c| c.discarded().copied())
            .collect();
        keys.sort();
        keys
    }

    pub fn page_count(&self) -> usize {
        self.clusters.iter().map(|c| c.members.len()).sum()
    }
}

pub struct DuplicateClusterer {
    strategy: ClusterStrategy,
    tie_break: TieBreak,
}

impl DuplicateClusterer {
    pub fn new(strategy: ClusterStrategy, tie_break: TieBreak) -> Self {
        Self {
            strategy,
            tie_break,
        }
    }

    pub fn strategy(&self) -> ClusterStrategy {
        self.strategy
    }

    /// Cluster the graph's pages and pick a representative for each cluster
    ///
    /// Fewer than two pages skip clustering and pass straight through.
    pub fn cluster(&self, graph: &SimilarityGraph, corpus: &Corpus) -> Result<Clustering> {
        let keys: Vec<PageKey> = (0..graph.len()).map(|i| graph.key(i)).collect();
        if keys.len() < 2 {
            return Ok(Clustering::singletons(&keys));
        }

        let groups = match self.strategy {
            ClusterStrategy::ConnectedComponents => graph.components(),
            ClusterStrategy::GreedyLeader => greedy_leader(graph),
            ClusterStrategy::Star => star(graph),
            ClusterStrategy::CompleteLinkage => complete_linkage(graph),
        };

        let mut clusters = Vec::with_capacity(groups.len());
        for mut group in groups {
            group.sort_unstable();
            let members: Vec<PageKey> = group.iter().map(|&i| keys[i]).collect();
            let representative = self.select_representative(&members, corpus)?;
            if members.len() > 1 {
                debug!(
                    "Cluster of {} pages, keeping {}",
                    members.len(),
                    representative
                );
            }
            clusters.push(Cluster {
                members,
                representative,
            });
        }
        clusters.sort_by_key(|c| c.members[0]);

        let clustering = Clustering { clusters };
        info!(
            "{:?} clustering: {} pages into {} clusters",
            self.strategy,
            keys.len(),
            clustering.clusters.len()
        );

        Ok(clustering)
    }

    /// Best member under the tie-break policy; equal scores go to the
    /// earliest key
    fn select_representative(&self, members: &[PageKey], corpus: &Corpus) -> Result<PageKey> {
        let mut best: Option<&PageRecord> = None;

        for key in members {
            let record = corpus.get(key).ok_or_else(|| {
                SiftError::Invariant(format!("Clustered page {} is not in the corpus", key))
            })?;

            let better = match best {
                None => true,
                Some(current) => match self.tie_break {
                    TieBreak::LargestContent => record.unique_words > current.unique_words,
                    TieBreak::HighestRelevance => record.relevance > current.relevance,
                },
            };
            if better {
                best = Some(record);
            }
        }

        best.map(|r| r.key)
            .ok_or_else(|| SiftError::Invariant("Empty cluster".to_string()))
    }
}

fn greedy_leader(graph: &SimilarityGraph) -> Vec<Vec<usize>> {
    let mut assigned = vec![false; graph.len()];
    let mut groups = Vec::new();

    for leader in 0..graph.len() {
        if assigned[leader] {
            continue;
        }
        assigned[leader] = true;
        let mut group = vec![leader];
        for neighbor in graph.neighbors(leader) {
            if !assigned[neighbor] {
                assigned[neighbor] = true;
                group.push(neighbor);
            }
        }
        groups.push(group);
    }

    groups
}

fn star(graph: &SimilarityGraph) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..graph.len()).collect();
    // Stable sort keeps document order among equal degrees
    order.sort_by_key(|&node| std::cmp::Reverse(graph.degree(node)));

    let mut assigned = vec![false; graph.len()];
    let mut groups = Vec::new();

    for center in order {
        if assigned[center] {
            continue;
        }
        assigned[center] = true;
        let mut group = vec![center];
        for neighbor in graph.neighbors(center) {
            if !assigned[neighbor] {
                assigned[neighbor] = true;
                group.push(neighbor);
            }
        }
        groups.push(group);
    }

    groups
}

fn complete_linkage(graph: &SimilarityGraph) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for node in 0..graph.len() {
        let target = groups
            .iter()
            .position(|group| group.iter().all(|&member| graph.has_edge(node, member)));
        match target {
            Some(index) => groups[index].push(node),
            None => groups.push(vec![node]),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::PageVector;
    use crate::similarity::SimilarityMatrix;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn record(page_index: usize, unique_words: usize, relevance: f32) -> PageRecord {
        PageRecord {
            key: PageKey::new(0, page_index),
            text: format!("page {}", page_index),
            unique_words,
            tokens: 10,
            intelligible: Some(true),
            vector: None,
            relevance,
            similar: BTreeSet::new(),
            file_index: 0,
            file_path: PathBuf::from("doc.pdf"),
            page_index,
        }
    }

    fn corpus(records: Vec<PageRecord>) -> Corpus {
        let mut corpus = Corpus::default();
        for r in records {
            corpus.insert(r);
        }
        corpus
    }

    fn graph(vectors: Vec<Vec<f32>>, threshold: f32) -> SimilarityGraph {
        let keys = (0..vectors.len()).map(|i| PageKey::new(0, i)).collect();
        let vectors: Vec<PageVector> = vectors.into_iter().map(PageVector::Dense).collect();
        SimilarityGraph::build(&SimilarityMatrix::build(keys, &vectors).unwrap(), threshold)
    }

    /// 0~1, 1~2, 0 and 2 below threshold, 3 unrelated
    fn chain() -> SimilarityGraph {
        graph(
            vec![
                vec![1.0, 0.0],
                vec![0.94, 0.34],
                vec![0.77, 0.64],
                vec![-1.0, 0.0],
            ],
            0.9,
        )
    }

    fn chain_corpus() -> Corpus {
        corpus(vec![
            record(0, 10, 0.1),
            record(1, 30, 0.2),
            record(2, 20, 0.9),
            record(3, 5, 0.5),
        ])
    }

    #[test]
    fn test_connected_components_largest_content() {
        let clusterer =
            DuplicateClusterer::new(ClusterStrategy::ConnectedComponents, TieBreak::LargestContent);
        let result = clusterer.cluster(&chain(), &chain_corpus()).unwrap();

        assert_eq!(result.clusters.len(), 2);
        assert_eq!(
            result.representatives(),
            vec![PageKey::new(0, 1), PageKey::new(0, 3)]
        );
        assert_eq!(
            result.discarded(),
            vec![PageKey::new(0, 0), PageKey::new(0, 2)]
        );
        assert_eq!(result.page_count(), 4);
    }

    #[test]
    fn test_highest_relevance_tie_break() {
        let clusterer = DuplicateClusterer::new(
            ClusterStrategy::ConnectedComponents,
            TieBreak::HighestRelevance,
        );
        let result = clusterer.cluster(&chain(), &chain_corpus()).unwrap();
        assert_eq!(result.clusters[0].representative, PageKey::new(0, 2));
    }

    #[test]
    fn test_equal_scores_keep_earliest() {
        let g = graph(vec![vec![1.0], vec![1.0]], 0.9);
        let c = corpus(vec![record(0, 7, 0.0), record(1, 7, 0.0)]);
        let clusterer =
            DuplicateClusterer::new(ClusterStrategy::ConnectedComponents, TieBreak::LargestContent);
        let result = clusterer.cluster(&g, &c).unwrap();
        assert_eq!(result.representatives(), vec![PageKey::new(0, 0)]);
    }

    #[test]
    fn test_greedy_leader_breaks_chain() {
        let clusterer =
            DuplicateClusterer::new(ClusterStrategy::GreedyLeader, TieBreak::LargestContent);
        let result = clusterer.cluster(&chain(), &chain_corpus()).unwrap();

        let groups: Vec<Vec<PageKey>> = result.clusters.iter().map(|c| c.members.clone()).collect();
        assert_eq!(
            groups,
            vec![
                vec![PageKey::new(0, 0), PageKey::new(0, 1)],
                vec![PageKey::new(0, 2)],
                vec![PageKey::new(0, 3)],
            ]
        );
    }

    #[test]
    fn test_star_centers_on_highest_degree() {
        let clusterer = DuplicateClusterer::new(ClusterStrategy::Star, TieBreak::LargestContent);
        let result = clusterer.cluster(&chain(), &chain_corpus()).unwrap();
        assert_eq!(result.clusters.len(), 2);
        assert_eq!(result.clusters[0].members.len(), 3);
    }

    #[test]
    fn test_complete_linkage_requires_all_pairs() {
        let clusterer =
            DuplicateClusterer::new(ClusterStrategy::CompleteLinkage, TieBreak::LargestContent);
        let result = clusterer.cluster(&chain(), &chain_corpus()).unwrap();
        assert_eq!(result.clusters.len(), 3);
        for cluster in &result.clusters {
            assert!(cluster.members.len() <= 2);
        }
    }

    #[test]
    fn test_every_strategy_covers_every_page_once() {
        for strategy in [
            ClusterStrategy::ConnectedComponents,
            ClusterStrategy::GreedyLeader,
            ClusterStrategy::Star,
            ClusterStrategy::CompleteLinkage,
        ] {
            let clusterer = DuplicateClusterer::new(strategy, TieBreak::LargestContent);
            let result = clusterer.cluster(&chain(), &chain_corpus()).unwrap();
            let mut all: Vec<PageKey> = result
                .clusters
                .iter()
                .flat_map(|c| c.members.iter().copied())
                .collect();
            all.sort();
            all.dedup();
            assert_eq!(all.len(), 4, "{:?}", strategy);
            assert_eq!(
                result.representatives().len() + result.discarded().len(),
                4
            );
        }
    }

    #[test]
    fn test_single_page_passes_through() {
        let g = graph(vec![vec![1.0]], 0.9);
        let c = corpus(vec![record(0, 3, 0.0)]);
        let clusterer =
            DuplicateClusterer::new(ClusterStrategy::ConnectedComponents, TieBreak::LargestContent);
        let result = clusterer.cluster(&g, &c).unwrap();
        assert_eq!(result.representatives(), vec![PageKey::new(0, 0)]);
        assert!(result.discarded().is_empty());
    }

    #[test]
    fn test_missing_record_is_invariant_error() {
        let clusterer =
            DuplicateClusterer::new(ClusterStrategy::ConnectedComponents, TieBreak::LargestContent);
        let result = clusterer.cluster(&chain(), &Corpus::default());
        assert!(matches!(result, Err(SiftError::Invariant(_))));
    }

    #[test]
    fn test_strategy_serde_names() {
        let strategy: ClusterStrategy = serde_json::from_str("\"complete_linkage\"").unwrap();
        assert_eq!(strategy, ClusterStrategy::CompleteLinkage);
        let tie: TieBreak = serde_json::from_str("\"highest_relevance\"").unwrap();
        assert_eq!(tie, TieBreak::HighestRelevance);
    }
}
