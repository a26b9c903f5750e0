//! Token-budgeted excerpt assembly
//!
//! Pages are admitted in relevance order and emitted in document order. The
//! first page that does not fit whole is cut at the remaining budget and
//! closes admission; smaller pages ranked after it are never backfilled.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::corpus::{Corpus, PageKey};
use crate::error::{Result, SiftError};
use crate::tokens::Tokenizer;

/// Joins consecutive pages in the excerpt
pub const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationResult {
    /// Admitted pages in document order
    pub included: Vec<PageKey>,
    /// The page cut at the budget boundary, if any
    pub truncated: Option<PageKey>,
    pub text: String,
    /// Tokens of every candidate page before any cut
    pub tokens_before_truncation: usize,
    /// Tokens of `text` as emitted
    pub tokens_after_truncation: usize,
}

pub struct BudgetAggregator {
    tokenizer: Arc<dyn Tokenizer>,
}

impl BudgetAggregator {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }

    /// Pack `ranked` pages into at most `budget` tokens
    ///
    /// `document_order` fixes the reading order of the emitted text. A
    /// budget of zero or less yields an empty result.
    pub fn aggregate(
        &self,
        ranked: &[PageKey],
        document_order: &[PageKey],
        corpus: &Corpus,
        budget: i64,
    ) -> Result<AggregationResult> {
        let mut tokens_before = 0;
        for key in ranked {
            tokens_before += self.record_tokens(corpus, key)?;
        }

        if budget <= 0 {
            debug!("Token budget {} leaves nothing to emit", budget);
            return Ok(AggregationResult {
                tokens_before_truncation: tokens_before,
                ..Default::default()
            });
        }

        let budget = budget as usize;
        let separator_tokens = self.tokenizer.count(PAGE_SEPARATOR);
        let mut remaining = budget;
        let mut admitted: BTreeSet<PageKey> = BTreeSet::new();
        let mut last_admitted: Option<PageKey> = None;
        let mut truncated: Option<(PageKey, String)> = None;

        for key in ranked {
            let tokens = self.record_tokens(corpus, key)?;
            let overhead = if admitted.is_empty() { 0 } else { separator_tokens };

            if tokens + overhead <= remaining {
                remaining -= tokens + overhead;
                admitted.insert(*key);
                last_admitted = Some(*key);
                continue;
            }

            let room = remaining.saturating_sub(overhead);
            if room > 0 {
                let text = self.record_text(corpus, key)?;
                let cut = self.tokenizer.truncate(text, room);
                if !cut.is_empty() {
                    debug!("Page {} cut from {} to {} tokens", key, tokens, room);
                    admitted.insert(*key);
                    last_admitted = Some(*key);
                    truncated = Some((*key, cut));
                }
            }
            break;
        }

        let mut included: Vec<PageKey> = document_order
            .iter()
            .filter(|k| admitted.contains(k))
            .copied()
            .collect();
        if included.len() != admitted.len() {
            return Err(SiftError::Invariant(format!(
                "{} pages admitted but only {} found in document order",
                admitted.len(),
                included.len()
            )));
        }

        let mut text = self.assemble(corpus, &included, truncated.as_ref())?;
        let mut tokens_after = self.tokenizer.count(&text);
        // Joining can merge tokens across page boundaries; the overflow comes
        // out of the last page admitted, which is the cut page when there is one
        if tokens_after > budget {
            let overflow = tokens_after - budget;
            let (key, page) = match truncated.take() {
                Some(cut) => cut,
                None => {
                    let key = last_admitted.ok_or_else(|| {
                        SiftError::Invariant(
                            "Excerpt over budget with no page admitted".to_string(),
                        )
                    })?;
                    (key, self.record_text(corpus, &key)?.to_string())
                }
            };

            let keep = self.tokenizer.count(&page).saturating_sub(overflow);
            let shortened = self.tokenizer.truncate(&page, keep);
            debug!("Page {} shortened by {} tokens after joining", key, overflow);
            if shortened.is_empty() {
                included.retain(|k| *k != key);
            } else {
                truncated = Some((key, shortened));
            }

            text = self.assemble(corpus, &included, truncated.as_ref())?;
            tokens_after = self.tokenizer.count(&text);
            if tokens_after > budget {
                return Err(SiftError::Tokenizer(format!(
                    "{} joined excerpt is {} tokens, over the budget of {}",
                    self.tokenizer.name(),
                    tokens_after,
                    budget
                )));
            }
        }

        info!(
            "Excerpt: {} pages, {} of {} candidate tokens (budget {})",
            included.len(),
            tokens_after,
            tokens_before,
            budget
        );

        Ok(AggregationResult {
            included,
            truncated: truncated.map(|(key, _)| key),
            text,
            tokens_before_truncation: tokens_before,
            tokens_after_truncation: tokens_after,
        })
    }

    /// Join `included` pages in order, substituting the cut text of `truncated`
    fn assemble(
        &self,
        corpus: &Corpus,
        included: &[PageKey],
        truncated: Option<&(PageKey, String)>,
    ) -> Result<String> {
        let mut pieces: Vec<&str> = Vec::with_capacity(included.len());
        for key in included {
            match truncated {
                Some((cut_key, cut)) if cut_key == key => pieces.push(cut),
                _ => pieces.push(self.record_text(corpus, key)?),
            }
        }
        Ok(pieces.join(PAGE_SEPARATOR))
    }

    fn record_tokens(&self, corpus: &Corpus, key: &PageKey) -> Result<usize> {
        corpus
            .get(key)
            .map(|r| r.tokens)
            .ok_or_else(|| SiftError::Invariant(format!("Ranked page {} is not in the corpus", key)))
    }

    fn record_text<'a>(&self, corpus: &'a Corpus, key: &PageKey) -> Result<&'a str> {
        corpus
            .get(key)
            .map(|r| r.text.as_str())
            .ok_or_else(|| SiftError::Invariant(format!("Ranked page {} is not in the corpus", key)))
    }
}
