// Intelligibility filter: separates usable natural-language pages from
// extraction noise and pages in languages the downstream consumer cannot use.
//
// Pass 1: placeholder density (broken fonts, image-only pages)
// Pass 2: language detection on what remains

mod language;

pub use language::{LanguageDetector, WhatlangDetector};

use ahash::AHashSet;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::IntelligibilityConfig;
use crate::corpus::{Corpus, PageKey};
use crate::error::{Result, SiftError};
use crate::pipeline::{CancelToken, Stage};

/// Classification of one page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Intelligible { language: String },
    /// Placeholder share above threshold; language detection was skipped
    PlaceholderNoise { fraction: f32 },
    ForeignLanguage { language: String },
    Undetected,
}

impl Verdict {
    pub fn is_intelligible(&self) -> bool {
        matches!(self, Verdict::Intelligible { .. })
    }
}

pub struct IntelligibilityFilter {
    placeholder: Regex,
    threshold: f32,
    languages: AHashSet<String>,
    detector: Arc<dyn LanguageDetector>,
}

impl IntelligibilityFilter {
    pub fn new(
        config: &IntelligibilityConfig,
        detector: Arc<dyn LanguageDetector>,
    ) -> Result<Self> {
        let placeholder = Regex::new(&config.placeholder_pattern).map_err(|e| {
            SiftError::InvalidConfigValue {
                path: "intelligibility.placeholder_pattern".to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            placeholder,
            threshold: config.placeholder_threshold,
            languages: config.languages.iter().cloned().collect(),
            detector,
        })
    }

    /// Share of `text` (in characters) covered by placeholder matches
    pub fn placeholder_fraction(&self, text: &str) -> f32 {
        let total = text.chars().count();
        if total == 0 {
            return 0.0;
        }
        let covered: usize = self
            .placeholder
            .find_iter(text)
            .map(|m| m.as_str().chars().count())
            .sum();
        covered as f32 / total as f32
    }

    /// Classify one page text
    pub fn classify(&self, text: &str) -> Verdict {
        let fraction = self.placeholder_fraction(text);
        if fraction > self.threshold {
            return Verdict::PlaceholderNoise { fraction };
        }

        let stripped = self.placeholder.replace_all(text, " ");
        let stripped = stripped.trim();
        if stripped.is_empty() {
            return Verdict::Undetected;
        }
        match self.detector.detect(stripped) {
            Some(language) if self.languages.contains(&language) => {
                Verdict::Intelligible { language }
            }
            Some(language) => Verdict::ForeignLanguage { language },
            None => Verdict::Undetected,
        }
    }

    /// Flag every page of the corpus and return the unintelligible keys
    pub fn apply(&self, corpus: &mut Corpus, cancel: &CancelToken) -> Result<Vec<PageKey>> {
        let mut rejected = Vec::new();

        for record in corpus.records_mut() {
            cancel.check(Stage::Filtering)?;

            let verdict = self.classify(&record.text);
            let intelligible = verdict.is_intelligible();
            if !intelligible {
                debug!("Page {} rejected: {:?}", record.key, verdict);
                rejected.push(record.key);
            }
            record.intelligible = Some(intelligible);
        }

        info!(
            "Intelligibility filter rejected {}/{} pages",
            rejected.len(),
            corpus.len()
        );

        Ok(rejected)
    }
}
