//! Page vectorization
//!
//! One contract, [`Vectorizer`], over three backends:
//! - [`TfIdfVectorizer`]: sparse lexical vectors fitted on the run's corpus
//! - [`FastEmbedVectorizer`]: local dense embeddings (all-MiniLM-L6-v2, 384-dim)
//! - [`HostedVectorizer`]: dense embeddings from an OpenAI-compatible API,
//!   batched under a token cap and billed per request
//!
//! Vectors only feed similarity. Relevance always comes from a lexical
//! [`TfIdfModel`], whichever backend produced the vectors.

mod hosted;
mod provider;
mod tfidf;

pub use hosted::{
    plan_batches, HostedEmbeddingClient, HostedVectorizer, OpenAiEmbeddingClient,
    MAX_INPUTS_PER_REQUEST,
};
pub use provider::FastEmbedVectorizer;
pub use tfidf::{SparseVector, TfIdfModel, TfIdfVectorizer};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;
use crate::pipeline::CancelToken;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Embedding request failed: {0}")]
    RequestFailed(String),

    #[error("Embedding request timed out")]
    Timeout,

    #[error("Cannot compare sparse and dense vectors")]
    MixedVectorKinds,
}

/// Vectorization backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorizerBackend {
    /// TF-IDF over the run's own corpus
    Lexical,
    /// Local embedding model
    Local,
    /// Hosted embedding API
    Hosted,
}

/// Vector of one page
#[derive(Debug, Clone, PartialEq)]
pub enum PageVector {
    Sparse(SparseVector),
    Dense(Vec<f32>),
}

impl PageVector {
    /// Dense components, when this vector has any
    pub fn as_dense(&self) -> Option<&[f32]> {
        match self {
            PageVector::Dense(values) => Some(values),
            PageVector::Sparse(_) => None,
        }
    }
}

/// Usage billed by a hosted backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EmbeddingUsage {
    pub requests: usize,
    pub tokens: usize,
    pub cost: f64,
}

/// Output of one vectorization call: exactly one vector per input text
#[derive(Debug, Clone)]
pub struct Vectorization {
    pub vectors: Vec<PageVector>,
    pub usage: Option<EmbeddingUsage>,
}

/// Turns page texts into vectors
///
/// Implementations must return one vector per input text, in input order.
pub trait Vectorizer: Send + Sync {
    fn vectorize(&self, texts: &[String], cancel: &CancelToken) -> Result<Vectorization>;

    fn backend(&self) -> VectorizerBackend;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_serde_names() {
        let backend: VectorizerBackend = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(backend, VectorizerBackend::Local);
        assert_eq!(
            serde_json::to_string(&VectorizerBackend::Hosted).unwrap(),
            "\"hosted\""
        );
    }

    #[test]
    fn test_as_dense() {
        assert_eq!(
            PageVector::Dense(vec![1.0, 2.0]).as_dense(),
            Some(&[1.0, 2.0][..])
        );
        assert!(PageVector::Sparse(SparseVector::default())
            .as_dense()
            .is_none());
    }
}
