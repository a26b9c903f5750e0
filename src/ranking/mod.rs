// Relevance ranking of the deduplicated page set.
//
// Scores are refitted over the representatives alone: once duplicates are
// gone, terms they shared stop being common and their weights shift.

use serde::Serialize;
use std::cmp::Ordering;

use crate::corpus::{Corpus, PageKey};
use crate::embedding::TfIdfModel;
use crate::error::{Result, SiftError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedPage {
    pub key: PageKey,
    pub score: f32,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RelevanceRanker;

impl RelevanceRanker {
    pub fn new() -> Self {
        Self
    }

    /// Score `representatives` against each other, highest first
    ///
    /// Equal scores keep document order.
    pub fn rank(&self, corpus: &Corpus, representatives: &[PageKey]) -> Result<Vec<RankedPage>> {
        let texts = representatives
            .iter()
            .map(|key| {
                corpus.get(key).map(|r| r.text.as_str()).ok_or_else(|| {
                    SiftError::Invariant(format!("Representative {} is not in the corpus", key))
                })
            })
            .collect::<Result<Vec<&str>>>()?;

        let scores = TfIdfModel::fit(&texts).relevance_scores();

        let mut ranked: Vec<RankedPage> = representatives
            .iter()
            .zip(scores)
            .map(|(&key, score)| RankedPage { key, score })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });

        tracing::debug!("Ranked {} representative pages", ranked.len());
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::PageRecord;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn corpus(texts: &[&str]) -> Corpus {
        let mut corpus = Corpus::default();
        for (i, text) in texts.iter().enumerate() {
            corpus.insert(PageRecord {
                key: PageKey::new(0, i),
                text: text.to_string(),
                unique_words: 0,
                tokens: 0,
                intelligible: Some(true),
                vector: None,
                relevance: 0.0,
                similar: BTreeSet::new(),
                file_index: 0,
                file_path: PathBuf::from("doc.txt"),
                page_index: i,
            });
        }
        corpus
    }

    #[test]
    fn test_rank_descending() {
        let corpus = corpus(&[
            "report",
            "quarterly revenue grew while operating costs in logistics declined sharply",
            "report summary",
        ]);
        let keys = corpus.keys();
        let ranked = RelevanceRanker::new().rank(&corpus, &keys).unwrap();

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].key, PageKey::new(0, 1));
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_keep_document_order() {
        let corpus = corpus(&["alpha beta", "gamma delta", "epsilon zeta"]);
        let keys = corpus.keys();
        let ranked = RelevanceRanker::new().rank(&corpus, &keys).unwrap();
        let order: Vec<PageKey> = ranked.iter().map(|r| r.key).collect();
        assert_eq!(order, keys);
    }

    #[test]
    fn test_scores_depend_on_surviving_set() {
        let corpus = corpus(&["shared term unique", "shared term", "shared other"]);
        let all = RelevanceRanker::new().rank(&corpus, &corpus.keys()).unwrap();
        let subset = RelevanceRanker::new()
            .rank(&corpus, &[PageKey::new(0, 0), PageKey::new(0, 2)])
            .unwrap();

        let score_all = all.iter().find(|r| r.key == PageKey::new(0, 0)).unwrap().score;
        let score_subset = subset
            .iter()
            .find(|r| r.key == PageKey::new(0, 0))
            .unwrap()
            .score;
        assert!((score_all - score_subset).abs() > 1e-4);
    }

    #[test]
    fn test_unknown_key_is_error() {
        let corpus = corpus(&["one"]);
        let result = RelevanceRanker::new().rank(&corpus, &[PageKey::new(4, 0)]);
        assert!(result.is_err());
    }
}
