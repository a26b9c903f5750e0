//! End-to-end run: files in, budgeted excerpt and statistics out
//!
//! Stages run sequentially on the calling thread:
//! indexing → filtering → vectorizing → clustering → ranking → aggregating.
//! The caller's progress callback fires before each stage, never inside one.
//! A [`CancelToken`] is polled between stages and inside the per-page and
//! per-batch loops.

mod cancel;
mod report;

pub use cancel::CancelToken;
pub use report::{RunReport, RunStatus};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::aggregation::{AggregationResult, BudgetAggregator};
use crate::clustering::{Clustering, DuplicateClusterer};
use crate::config::{Config, ConfigValidator};
use crate::corpus::{BatchReport, Corpus, CorpusIndexer, PageKey, PageRecord};
use crate::embedding::{
    EmbeddingError, EmbeddingUsage, FastEmbedVectorizer, HostedVectorizer, OpenAiEmbeddingClient,
    PageVector, TfIdfModel, TfIdfVectorizer, Vectorization, Vectorizer, VectorizerBackend,
};
use crate::error::{Result, SiftError};
use crate::extraction::{ExtractorFactory, PageExtractor};
use crate::filtering::{IntelligibilityFilter, LanguageDetector, WhatlangDetector};
use crate::ranking::{RankedPage, RelevanceRanker};
use crate::similarity::{SimilarityGraph, SimilarityMatrix};
use crate::tokens::{TiktokenTokenizer, Tokenizer};

/// Pipeline stage, reported to progress callbacks and cancellation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Indexing,
    Filtering,
    Vectorizing,
    Clustering,
    Ranking,
    Aggregating,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Indexing => "indexing",
            Stage::Filtering => "filtering",
            Stage::Vectorizing => "vectorizing",
            Stage::Clustering => "clustering",
            Stage::Ranking => "ranking",
            Stage::Aggregating => "aggregating",
        };
        f.write_str(name)
    }
}

/// External collaborators of a pipeline
///
/// All are shared, read-only during a run and safe to use from any thread.
/// The vectorizer in particular is owned by the caller: a loaded embedding
/// model can be reused across pipelines and runs without reloading it.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn PageExtractor>,
    pub tokenizer: Arc<dyn Tokenizer>,
    pub detector: Arc<dyn LanguageDetector>,
    pub vectorizer: Arc<dyn Vectorizer>,
}

impl Collaborators {
    /// Build the collaborators named by `config`
    ///
    /// Loading a local model or checking the hosted credential happens here,
    /// before any file is opened.
    pub fn from_config(config: &Config) -> Result<Self> {
        let extractor = ExtractorFactory::create(config.extraction.backend)
            .map_err(|e| SiftError::Config(e.to_string()))?;
        let tokenizer: Arc<dyn Tokenizer> =
            Arc::new(TiktokenTokenizer::for_model(&config.budget.tokenizer_model)?);
        let vectorizer = build_vectorizer(config, tokenizer.clone())?;

        Ok(Self {
            extractor,
            tokenizer,
            detector: Arc::new(WhatlangDetector::default()),
            vectorizer,
        })
    }
}

/// Vectorizer for the configured backend
pub fn build_vectorizer(
    config: &Config,
    tokenizer: Arc<dyn Tokenizer>,
) -> Result<Arc<dyn Vectorizer>> {
    let vectorizer: Arc<dyn Vectorizer> = match config.vectorizer.backend {
        VectorizerBackend::Lexical => Arc::new(TfIdfVectorizer),
        VectorizerBackend::Local => {
            Arc::new(FastEmbedVectorizer::new(&config.vectorizer.local_model)?)
        }
        VectorizerBackend::Hosted => {
            let api_key = config.hosted_api_key()?;
            let client = OpenAiEmbeddingClient::new(
                &api_key,
                &config.hosted.base_url,
                Duration::from_secs(config.hosted.timeout_secs),
            )?;
            Arc::new(HostedVectorizer::new(
                Arc::new(client),
                tokenizer,
                config.hosted.model.clone(),
                config.hosted.batch_token_cap,
                config.hosted.price_per_1k_tokens,
            ))
        }
    };
    Ok(vectorizer)
}

/// Page accounting of one completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub total_pages: usize,
    pub selected: usize,
    pub discarded_by_similarity: usize,
    pub discarded_unintelligible: usize,
}

impl Counters {
    /// Every indexed page must land in exactly one bucket
    pub fn check(&self) -> Result<()> {
        let accounted =
            self.selected + self.discarded_by_similarity + self.discarded_unintelligible;
        if accounted != self.total_pages {
            return Err(SiftError::Invariant(format!(
                "selected {} + discarded by similarity {} + unintelligible {} != {} pages",
                self.selected,
                self.discarded_by_similarity,
                self.discarded_unintelligible,
                self.total_pages
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoContentReason {
    /// No file yielded a single page
    NoProcessableInput,
    /// Pages were indexed but none passed the intelligibility filter
    NoIntelligiblePages,
}

impl fmt::Display for NoContentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoContentReason::NoProcessableInput => f.write_str("no processable input"),
            NoContentReason::NoIntelligiblePages => f.write_str("no intelligible pages"),
        }
    }
}

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: BTreeMap<PageKey, PageRecord>,
    pub document_order: Vec<PageKey>,
    pub unintelligible: Vec<PageKey>,
    pub counters: Counters,
    pub clustering: Clustering,
    pub ranking: Vec<RankedPage>,
    pub aggregation: AggregationResult,
    pub batch: BatchReport,
    pub usage: Option<EmbeddingUsage>,
    pub backend: VectorizerBackend,
    pub threshold: f32,
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Completed(Box<PipelineOutput>),
    /// Nothing to emit; not an error
    NoContent {
        reason: NoContentReason,
        batch: BatchReport,
        total_pages: usize,
        unintelligible: Vec<PageKey>,
    },
}

pub struct Pipeline {
    indexer: CorpusIndexer,
    filter: IntelligibilityFilter,
    vectorizer: Arc<dyn Vectorizer>,
    clusterer: DuplicateClusterer,
    ranker: RelevanceRanker,
    aggregator: BudgetAggregator,
    threshold: f32,
    budget: i64,
}

impl Pipeline {
    /// Wire `collaborators` with the settings of `config`
    ///
    /// The similarity threshold is the one configured for the injected
    /// vectorizer's backend.
    pub fn new(config: &Config, collaborators: Collaborators) -> Result<Self> {
        let Collaborators {
            extractor,
            tokenizer,
            detector,
            vectorizer,
        } = collaborators;

        let threshold = config.threshold_for(vectorizer.backend());

        Ok(Self {
            indexer: CorpusIndexer::new(extractor, tokenizer.clone(), config.extraction.lowercase),
            filter: IntelligibilityFilter::new(&config.intelligibility, detector)?,
            vectorizer,
            clusterer: DuplicateClusterer::new(
                config.clustering.strategy,
                config.clustering.tie_break,
            ),
            ranker: RelevanceRanker::new(),
            aggregator: BudgetAggregator::new(tokenizer),
            threshold,
            budget: config.budget.max_tokens,
        })
    }

    /// Validate `config` and build every collaborator it names
    pub fn from_config(config: &Config) -> Result<Self> {
        ConfigValidator::validate(config)?;
        Self::new(config, Collaborators::from_config(config)?)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Run all stages over `files`, in the given order
    pub fn run(
        &self,
        files: &[PathBuf],
        progress: &mut dyn FnMut(Stage),
        cancel: &CancelToken,
    ) -> Result<PipelineOutcome> {
        progress(Stage::Indexing);
        let (mut corpus, batch) = self.indexer.index(files, cancel)?;
        if corpus.is_empty() {
            warn!("No pages extracted from {} files", files.len());
            return Ok(PipelineOutcome::NoContent {
                reason: NoContentReason::NoProcessableInput,
                batch,
                total_pages: 0,
                unintelligible: Vec::new(),
            });
        }

        cancel.check(Stage::Filtering)?;
        progress(Stage::Filtering);
        let unintelligible = self.filter.apply(&mut corpus, cancel)?;
        let intelligible = corpus.intelligible_keys();
        if intelligible.is_empty() {
            warn!("None of {} pages passed the intelligibility filter", corpus.len());
            return Ok(PipelineOutcome::NoContent {
                reason: NoContentReason::NoIntelligiblePages,
                batch,
                total_pages: corpus.len(),
                unintelligible,
            });
        }

        cancel.check(Stage::Vectorizing)?;
        progress(Stage::Vectorizing);
        let vectorization = self.vectorize(&mut corpus, &intelligible, cancel)?;

        cancel.check(Stage::Clustering)?;
        progress(Stage::Clustering);
        let clustering = self.cluster(&mut corpus, intelligible, &vectorization.vectors)?;

        cancel.check(Stage::Ranking)?;
        progress(Stage::Ranking);
        let representatives = clustering.representatives();
        let ranking = self.ranker.rank(&corpus, &representatives)?;

        cancel.check(Stage::Aggregating)?;
        progress(Stage::Aggregating);
        let ranked_keys: Vec<PageKey> = ranking.iter().map(|r| r.key).collect();
        let document_order = corpus.keys();
        let aggregation =
            self.aggregator
                .aggregate(&ranked_keys, &document_order, &corpus, self.budget)?;

        let counters = Counters {
            total_pages: corpus.len(),
            selected: representatives.len(),
            discarded_by_similarity: clustering.discarded().len(),
            discarded_unintelligible: unintelligible.len(),
        };
        counters.check()?;

        info!(
            "Run complete: {} pages, {} selected, {} duplicates, {} unintelligible",
            counters.total_pages,
            counters.selected,
            counters.discarded_by_similarity,
            counters.discarded_unintelligible
        );

        Ok(PipelineOutcome::Completed(Box::new(PipelineOutput {
            records: corpus.into_records(),
            document_order,
            unintelligible,
            counters,
            clustering,
            ranking,
            aggregation,
            batch,
            usage: vectorization.usage,
            backend: self.vectorizer.backend(),
            threshold: self.threshold,
        })))
    }

    /// Vectors for `keys`, plus pre-deduplication relevance on every record
    fn vectorize(
        &self,
        corpus: &mut Corpus,
        keys: &[PageKey],
        cancel: &CancelToken,
    ) -> Result<Vectorization> {
        let texts: Vec<String> = keys
            .iter()
            .filter_map(|k| corpus.get(k).map(|r| r.text.clone()))
            .collect();

        let vectorization = self.vectorizer.vectorize(&texts, cancel)?;
        if vectorization.vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: vectorization.vectors.len(),
            }
            .into());
        }

        let relevance = TfIdfModel::fit(&texts).relevance_scores();
        for ((key, vector), score) in keys.iter().zip(&vectorization.vectors).zip(relevance) {
            if let Some(record) = corpus.get_mut(key) {
                record.relevance = score;
                if let PageVector::Dense(values) = vector {
                    record.vector = Some(values.clone());
                }
            }
        }

        info!(
            "Vectorized {} pages with {:?} backend",
            texts.len(),
            self.vectorizer.backend()
        );
        Ok(vectorization)
    }

    /// Duplicate clusters over `keys`; fills each record's similar-page set
    fn cluster(
        &self,
        corpus: &mut Corpus,
        keys: Vec<PageKey>,
        vectors: &[PageVector],
    ) -> Result<Clustering> {
        if keys.len() < 2 {
            return Ok(Clustering::singletons(&keys));
        }

        let matrix = SimilarityMatrix::build(keys, vectors)?;
        let graph = SimilarityGraph::build(&matrix, self.threshold);

        for node in 0..graph.len() {
            let similar = graph.neighbors(node).into_iter().map(|n| graph.key(n));
            if let Some(record) = corpus.get_mut(&graph.key(node)) {
                record.similar = similar.collect();
            }
        }

        self.clusterer.cluster(&graph, corpus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Vectorizing.to_string(), "vectorizing");
        assert_eq!(
            serde_json::to_string(&Stage::Aggregating).unwrap(),
            "\"aggregating\""
        );
    }

    #[test]
    fn test_counter_check() {
        let good = Counters {
            total_pages: 5,
            selected: 2,
            discarded_by_similarity: 2,
            discarded_unintelligible: 1,
        };
        assert!(good.check().is_ok());

        let bad = Counters {
            selected: 3,
            ..good
        };
        assert!(matches!(bad.check(), Err(SiftError::Invariant(_))));
    }

    #[test]
    fn test_no_content_reason_display() {
        assert_eq!(
            NoContentReason::NoIntelligiblePages.to_string(),
            "no intelligible pages"
        );
    }
}
