//! Serializable summary of one run
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use super::{Counters, NoContentReason, PipelineOutcome};
use crate::corpus::{FileReport, PageKey};
use crate::embedding::{EmbeddingUsage, VectorizerBackend};
use crate::error::{Result, SiftError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    NoContent { reason: NoContentReason },
}

/// Report of one run
///
/// Carries counters and accounting only; the excerpt itself is written
/// separately unless `excerpt` is filled in.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique run identifier
    pub id: Uuid,

    pub generated_at: DateTime<Utc>,

    pub status: RunStatus,

    pub files: Vec<FileReport>,

    pub counters: Counters,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<VectorizerBackend>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_usage: Option<EmbeddingUsage>,

    pub unintelligible: Vec<PageKey>,

    /// Excerpt pages in document order
    pub included: Vec<PageKey>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<PageKey>,

    pub tokens_before_truncation: usize,

    pub tokens_after_truncation: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl RunReport {
    pub fn from_outcome(outcome: &PipelineOutcome) -> Self {
        let base = Self {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            status: RunStatus::Completed,
            files: Vec::new(),
            counters: Counters::default(),
            backend: None,
            threshold: None,
            embedding_usage: None,
            unintelligible: Vec::new(),
            included: Vec::new(),
            truncated: None,
            tokens_before_truncation: 0,
            tokens_after_truncation: 0,
            excerpt: None,
        };

        match outcome {
            PipelineOutcome::Completed(output) => Self {
                files: output.batch.files.clone(),
                counters: output.counters,
                backend: Some(output.backend),
                threshold: Some(output.threshold),
                embedding_usage: output.usage,
                unintelligible: output.unintelligible.clone(),
                included: output.aggregation.included.clone(),
                truncated: output.aggregation.truncated,
                tokens_before_truncation: output.aggregation.tokens_before_truncation,
                tokens_after_truncation: output.aggregation.tokens_after_truncation,
                ..base
            },
            PipelineOutcome::NoContent {
                reason,
                batch,
                total_pages,
                unintelligible,
            } => Self {
                status: RunStatus::NoContent { reason: *reason },
                files: batch.files.clone(),
                counters: Counters {
                    total_pages: *total_pages,
                    discarded_unintelligible: unintelligible.len(),
                    ..Counters::default()
                },
                unintelligible: unintelligible.clone(),
                ..base
            },
        }
    }

    /// Attach the excerpt text of a completed run
    pub fn with_excerpt(mut self, outcome: &PipelineOutcome) -> Self {
        if let PipelineOutcome::Completed(output) = outcome {
            self.excerpt = Some(output.aggregation.text.clone());
        }
        self
    }

    pub fn skipped_files(&self) -> Vec<&PathBuf> {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, crate::corpus::FileOutcome::Skipped { .. }))
            .map(|f| &f.path)
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|source| SiftError::Json {
            source,
            context: "Failed to serialize run report".to_string(),
        })
    }
}
