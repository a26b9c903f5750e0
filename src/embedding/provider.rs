/// Local dense vectors via FastEmbed
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;

use super::{EmbeddingError, PageVector, Vectorization, Vectorizer, VectorizerBackend};
use crate::error::Result;
use crate::pipeline::{CancelToken, Stage};

/// Pages embedded per model call; cancellation is polled between chunks
const CHUNK_SIZE: usize = 64;

/// FastEmbed vectorizer
///
/// The model is loaded once by the caller and shared through an `Arc`, so
/// several pipelines (or repeated runs) reuse the same weights without any
/// process-wide state.
///
/// **Important**: models are downloaded on first use to the FastEmbed cache.
/// - all-MiniLM-L6-v2: ~90MB (384 dims), default
/// - bge-small-en-v1.5: ~130MB (384 dims)
/// - bge-base-en-v1.5: ~440MB (768 dims)
#[derive(Clone)]
pub struct FastEmbedVectorizer {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedVectorizer {
    pub fn new(model_name: &str) -> std::result::Result<Self, EmbeddingError> {
        let (embedding_model, dimension) = match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
            _ => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                    model_name
                )));
            }
        };

        tracing::info!(
            "Loading local embedding model: {} ({}D)",
            model_name,
            dimension
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);
        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self::from_shared(Arc::new(model), model_name, dimension))
    }

    /// Wrap an already loaded model
    pub fn from_shared(model: Arc<TextEmbedding>, model_name: &str, dimension: usize) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            dimension,
        }
    }

    pub fn with_default_model() -> std::result::Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2")
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn embed_chunk(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
        let embeddings = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }
}

impl Vectorizer for FastEmbedVectorizer {
    fn vectorize(&self, texts: &[String], cancel: &CancelToken) -> Result<Vectorization> {
        // Dropping empty inputs would break the one-vector-per-page contract
        if let Some(position) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(format!(
                "Empty text at position {}",
                position
            ))
            .into());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(CHUNK_SIZE) {
            cancel.check(Stage::Vectorizing)?;
            vectors.extend(self.embed_chunk(chunk)?.into_iter().map(PageVector::Dense));
        }

        tracing::debug!("Embedded {} pages with {}", vectors.len(), self.model_name);

        Ok(Vectorization {
            vectors,
            usage: None,
        })
    }

    fn backend(&self) -> VectorizerBackend {
        VectorizerBackend::Local
    }
}
