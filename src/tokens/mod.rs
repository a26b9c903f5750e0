//! Token counting and budget truncation
//!
//! Counts are always taken with the same tokenizer the downstream language
//! model uses, so budget accounting matches what the model will see.

use crate::error::{Result, SiftError};
use tiktoken_rs::CoreBPE;

/// Tokenizer collaborator used for page counts, batch caps and the budget
pub trait Tokenizer: Send + Sync {
    /// Number of tokens in `text`
    fn count(&self, text: &str) -> usize;

    /// Longest prefix of `text` that encodes to at most `max_tokens` tokens
    fn truncate(&self, text: &str, max_tokens: usize) -> String;

    /// Model or encoding name
    fn name(&self) -> &str;
}

/// BPE tokenizer backed by tiktoken-rs
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
    name: String,
}

impl TiktokenTokenizer {
    /// Create a tokenizer for a model name ("gpt-4o", "gpt-3.5-turbo") or an
    /// encoding name ("cl100k_base", "o200k_base")
    pub fn for_model(model_or_encoding: &str) -> Result<Self> {
        let lower = model_or_encoding.to_ascii_lowercase();

        let bpe = match tiktoken_rs::get_bpe_from_model(&lower) {
            Ok(bpe) => bpe,
            Err(_) => match lower.as_str() {
                "o200k_base" => tiktoken_rs::o200k_base(),
                "cl100k_base" => tiktoken_rs::cl100k_base(),
                "p50k_base" => tiktoken_rs::p50k_base(),
                _ => {
                    return Err(SiftError::Tokenizer(format!(
                        "Unsupported model/encoding: {}",
                        model_or_encoding
                    )))
                }
            }
            .map_err(|e| SiftError::Tokenizer(e.to_string()))?,
        };

        tracing::debug!("Loaded tokenizer for {}", lower);

        Ok(Self { bpe, name: lower })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }

        // A cut inside a multi-byte character does not decode, and a decoded
        // prefix may re-encode differently at its tail; back off one token
        // at a time until the prefix both decodes and re-counts within budget.
        let mut take = max_tokens;
        while take > 0 {
            if let Ok(prefix) = self.bpe.decode(tokens[..take].to_vec()) {
                if self.count(&prefix) <= max_tokens {
                    return prefix;
                }
            }
            take -= 1;
        }
        String::new()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// One token per whitespace-separated word
///
/// Needs no vocabulary; useful as a rough budget when the target model's
/// encoding is unknown, and fully predictable in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        text.split_whitespace()
            .take(max_tokens)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn name(&self) -> &str {
        "whitespace"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_truncate() {
        let tokenizer = WhitespaceTokenizer;
        assert_eq!(tokenizer.count("a b  c\nd"), 4);
        assert_eq!(tokenizer.truncate("a b c d", 2), "a b");
        assert_eq!(tokenizer.truncate("a b", 5), "a b");
    }

    #[test]
    fn test_unknown_model_rejected() {
        assert!(TiktokenTokenizer::for_model("no-such-encoding").is_err());
    }

    #[test]
    fn test_tiktoken_truncate_within_budget() {
        let tokenizer = TiktokenTokenizer::for_model("cl100k_base").unwrap();
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);

        let truncated = tokenizer.truncate(&text, 17);
        assert!(tokenizer.count(&truncated) <= 17);
        assert!(tokenizer.count(&truncated) >= 15);
        assert!(text.starts_with(&truncated));
    }

    #[test]
    fn test_tiktoken_truncate_multibyte() {
        let tokenizer = TiktokenTokenizer::for_model("cl100k_base").unwrap();
        let text = "日本語のテキストを切り詰める。".repeat(5);

        for budget in 1..10 {
            let truncated = tokenizer.truncate(&text, budget);
            assert!(tokenizer.count(&truncated) <= budget);
            assert!(text.starts_with(&truncated));
        }
    }

    #[test]
    fn test_model_names_resolve() {
        let tokenizer = TiktokenTokenizer::for_model("gpt-4").unwrap();
        assert_eq!(tokenizer.name(), "gpt-4");
        assert!(tokenizer.count("hello world") > 0);
    }
}
