/// Lexical TF-IDF model: sparse page vectors and relevance scores
use ahash::AHashMap;
use regex::Regex;
use std::sync::OnceLock;

use super::{PageVector, Vectorization, Vectorizer, VectorizerBackend};
use crate::error::Result;
use crate::pipeline::{CancelToken, Stage};

fn term_regex() -> &'static Regex {
    // Terms of two or more word characters
    static TERM: OnceLock<Regex> = OnceLock::new();
    TERM.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("static regex"))
}

/// Sparse vector with strictly increasing term indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Build from unsorted `(index, value)` pairs; indices must be unique
    pub fn from_pairs(mut pairs: Vec<(u32, f32)>) -> Self {
        pairs.sort_unstable_by_key(|(index, _)| *index);
        let (indices, values) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// TF-IDF fitted on one corpus
///
/// Raw term counts weighted by smooth idf `ln((1 + n) / (1 + df)) + 1`, each
/// row L2-normalized. The model is corpus-dependent: refit whenever the set
/// of documents changes.
#[derive(Debug, Clone)]
pub struct TfIdfModel {
    vocabulary: AHashMap<String, u32>,
    idf: Vec<f32>,
    rows: Vec<SparseVector>,
}

impl TfIdfModel {
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let mut vocabulary: AHashMap<String, u32> = AHashMap::new();
        let mut document_frequency: Vec<u32> = Vec::new();
        let mut counts: Vec<AHashMap<u32, u32>> = Vec::with_capacity(documents.len());

        for document in documents {
            let mut term_counts: AHashMap<u32, u32> = AHashMap::new();
            for m in term_regex().find_iter(document.as_ref()) {
                let term = m.as_str().to_lowercase();
                let next = vocabulary.len() as u32;
                let index = *vocabulary.entry(term).or_insert(next);
                if index as usize == document_frequency.len() {
                    document_frequency.push(0);
                }
                *term_counts.entry(index).or_insert(0) += 1;
            }
            for index in term_counts.keys() {
                document_frequency[*index as usize] += 1;
            }
            counts.push(term_counts);
        }

        let n = documents.len() as f32;
        let idf: Vec<f32> = document_frequency
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f32)).ln() + 1.0)
            .collect();

        let rows = counts
            .into_iter()
            .map(|term_counts| {
                let weighted: Vec<(u32, f32)> = term_counts
                    .into_iter()
                    .map(|(index, tf)| (index, tf as f32 * idf[index as usize]))
                    .collect();
                let norm = weighted.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
                let normalized = weighted
                    .into_iter()
                    .map(|(index, w)| (index, if norm > 0.0 { w / norm } else { 0.0 }))
                    .collect();
                SparseVector::from_pairs(normalized)
            })
            .collect();

        Self {
            vocabulary,
            idf,
            rows,
        }
    }

    /// L2-normalized TF-IDF row of each fitted document
    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    /// Relevance of each document: the sum of its normalized TF-IDF weights
    ///
    /// Pages carrying many distinct, corpus-rare terms score highest.
    pub fn relevance_scores(&self) -> Vec<f32> {
        self.rows
            .iter()
            .map(|row| row.values.iter().sum())
            .collect()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        self.vocabulary
            .get(&term.to_lowercase())
            .map(|&index| self.idf[index as usize])
    }
}

/// Sparse lexical vectors, refitted on every call
#[derive(Debug, Default, Clone, Copy)]
pub struct TfIdfVectorizer;

impl Vectorizer for TfIdfVectorizer {
    fn vectorize(&self, texts: &[String], cancel: &CancelToken) -> Result<Vectorization> {
        cancel.check(Stage::Vectorizing)?;
        let model = TfIdfModel::fit(texts);
        tracing::debug!(
            "Fitted TF-IDF on {} pages ({} terms)",
            texts.len(),
            model.vocabulary_size()
        );
        Ok(Vectorization {
            vectors: model.rows.into_iter().map(PageVector::Sparse).collect(),
            usage: None,
        })
    }

    fn backend(&self) -> VectorizerBackend {
        VectorizerBackend::Lexical
    }
}
