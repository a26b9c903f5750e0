//! Pagesift - multi-document page relevance and deduplication
//!
//! Turns an ordered batch of multi-page documents into one non-redundant
//! excerpt that fits a language model's token budget. Pages are indexed
//! under stable `(file, page)` keys, screened for intelligibility, vectorized,
//! clustered into near-duplicate groups, ranked by lexical relevance and
//! packed greedily under the budget.

pub mod aggregation;
pub mod cli;
pub mod clustering;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod extraction;
pub mod filtering;
pub mod pipeline;
pub mod ranking;
pub mod similarity;
pub mod tokens;

pub use error::{Result, SiftError};
pub use pipeline::{CancelToken, Collaborators, Pipeline, PipelineOutcome, Stage};
