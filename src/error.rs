use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::pipeline::Stage;

/// Main error type for pagesift
#[derive(Error, Debug)]
pub enum SiftError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// A single file could not be read by the extraction backend
    #[error("Extraction failed for {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// Vectorization backend errors
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Token counting or truncation failed
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// The run was cancelled by the caller
    #[error("Run cancelled during {stage}")]
    Cancelled { stage: Stage },

    /// Internal bookkeeping does not add up
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for pagesift operations
pub type Result<T> = std::result::Result<T, SiftError>;
