use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use std::collections::BTreeMap;

use super::SimilarityMatrix;
use crate::corpus::PageKey;

/// Undirected graph of pages, with an edge wherever similarity >= threshold
///
/// Node `i` is row `i` of the matrix it was built from, so node order is
/// document order.
#[derive(Debug, Clone)]
pub struct SimilarityGraph {
    graph: UnGraph<PageKey, f32>,
    threshold: f32,
}

impl SimilarityGraph {
    pub fn build(matrix: &SimilarityMatrix, threshold: f32) -> Self {
        let n = matrix.len();
        let mut graph = UnGraph::with_capacity(n, n);
        let nodes: Vec<NodeIndex> = matrix.keys().iter().map(|&k| graph.add_node(k)).collect();

        for i in 0..n {
            for j in (i + 1)..n {
                let score = matrix.score(i, j);
                if score >= threshold {
                    graph.add_edge(nodes[i], nodes[j], score);
                }
            }
        }

        tracing::debug!(
            "Similarity graph: {} pages, {} edges at threshold {}",
            n,
            graph.edge_count(),
            threshold
        );

        Self { graph, threshold }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn key(&self, node: usize) -> PageKey {
        self.graph[NodeIndex::new(node)]
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.graph
            .find_edge(NodeIndex::new(a), NodeIndex::new(b))
            .is_some()
    }

    /// Direct neighbors of `node`, ascending
    pub fn neighbors(&self, node: usize) -> Vec<usize> {
        let mut neighbors: Vec<usize> = self
            .graph
            .neighbors(NodeIndex::new(node))
            .map(|n| n.index())
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }

    pub fn degree(&self, node: usize) -> usize {
        self.graph.edges(NodeIndex::new(node)).count()
    }

    /// `(a, b, score)` for every edge, with `a < b`
    pub fn edges(&self) -> Vec<(usize, usize, f32)> {
        self.graph
            .edge_references()
            .map(|e| {
                let (a, b) = (e.source().index(), e.target().index());
                (a.min(b), a.max(b), *e.weight())
            })
            .collect()
    }

    /// Connected components as ascending node lists, ordered by first member
    ///
    /// Transitive chains merge: a~b and b~c put a, b and c together even when
    /// a and c score below the threshold.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut sets = UnionFind::<usize>::new(self.len());
        for edge in self.graph.edge_references() {
            sets.union(edge.source().index(), edge.target().index());
        }

        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for node in 0..self.len() {
            groups.entry(sets.find(node)).or_default().push(node);
        }

        let mut components: Vec<Vec<usize>> = groups.into_values().collect();
        components.sort_by_key(|members| members[0]);
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::PageVector;

    fn graph(vectors: Vec<Vec<f32>>, threshold: f32) -> SimilarityGraph {
        let keys = (0..vectors.len()).map(|i| PageKey::new(0, i)).collect();
        let vectors: Vec<PageVector> = vectors.into_iter().map(PageVector::Dense).collect();
        SimilarityGraph::build(&SimilarityMatrix::build(keys, &vectors).unwrap(), threshold)
    }

    #[test]
    fn test_transitive_chain_merges() {
        // 0~1 and 1~2 at ~0.94, 0 vs 2 at ~0.77
        let g = graph(
            vec![
                vec![1.0, 0.0],
                vec![0.94, 0.34],
                vec![0.77, 0.64],
                vec![-1.0, 0.0],
            ],
            0.9,
        );

        assert!(g.has_edge(0, 1));
        assert!(g.has_edge(1, 2));
        assert!(!g.has_edge(0, 2));
        assert_eq!(g.components(), vec![vec![0, 1, 2], vec![3]]);
    }

    #[test]
    fn test_no_edges_gives_singletons() {
        let g = graph(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 0.5);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.components(), vec![vec![0], vec![1]]);
        assert!(g.neighbors(0).is_empty());
    }

    #[test]
    fn test_neighbors_and_degree() {
        let g = graph(vec![vec![1.0], vec![1.0], vec![1.0]], 0.9);
        assert_eq!(g.neighbors(1), vec![0, 2]);
        assert_eq!(g.degree(1), 2);
        assert_eq!(g.edges().len(), 3);
        assert_eq!(g.key(2), PageKey::new(0, 2));
    }
}
