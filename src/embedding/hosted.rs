//! Hosted embedding API backend
//!
//! Texts are packed into sequential request batches that never exceed a token
//! cap. Requests go out one at a time so each response's billed usage pairs
//! with exactly one request. Retries are left to the caller.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    EmbeddingError, EmbeddingUsage, PageVector, Vectorization, Vectorizer, VectorizerBackend,
};
use crate::error::Result;
use crate::pipeline::{CancelToken, Stage};
use crate::tokens::Tokenizer;

/// Upper bound on inputs per request accepted by OpenAI-compatible endpoints
pub const MAX_INPUTS_PER_REQUEST: usize = 2048;

/// Capability consumed from a hosted embedding service
pub trait HostedEmbeddingClient: Send + Sync {
    /// Embed `texts` with `model`; returns one vector per text and the tokens billed
    fn embed(
        &self,
        texts: &[String],
        model: &str,
    ) -> std::result::Result<(Vec<Vec<f32>>, usize), EmbeddingError>;
}

/// Blocking client for OpenAI-compatible `/embeddings` endpoints
#[derive(Clone)]
pub struct OpenAiEmbeddingClient {
    client: Client,
    endpoint: String,
}

impl OpenAiEmbeddingClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        timeout: Duration,
    ) -> std::result::Result<Self, EmbeddingError> {
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::InitializationError(
                "missing API key".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| EmbeddingError::InitializationError("malformed API key".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    total_tokens: usize,
}

fn request_error(err: reqwest::Error) -> EmbeddingError {
    if err.is_timeout() {
        EmbeddingError::Timeout
    } else {
        EmbeddingError::RequestFailed(err.to_string())
    }
}

impl HostedEmbeddingClient for OpenAiEmbeddingClient {
    fn embed(
        &self,
        texts: &[String],
        model: &str,
    ) -> std::result::Result<(Vec<Vec<f32>>, usize), EmbeddingError> {
        let request = EmbeddingRequest {
            model,
            input: texts,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingError::RequestFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let mut parsed: EmbeddingResponse = response.json().map_err(request_error)?;
        parsed.data.sort_by_key(|entry| entry.index);

        let tokens = parsed
            .usage
            .map(|u| u.total_tokens.max(u.prompt_tokens))
            .unwrap_or(0);
        let vectors = parsed.data.into_iter().map(|entry| entry.embedding).collect();

        Ok((vectors, tokens))
    }
}

/// Split `token_counts` into consecutive batches
///
/// A batch closes before it would exceed `cap` tokens or
/// [`MAX_INPUTS_PER_REQUEST`] inputs. A single text above the cap travels
/// alone. Batches cover every index exactly once, in order.
pub fn plan_batches(token_counts: &[usize], cap: usize) -> Vec<Range<usize>> {
    let mut batches = Vec::new();
    let mut start = 0;
    let mut running = 0;

    for (i, &count) in token_counts.iter().enumerate() {
        let full = i > start && (running + count > cap || i - start >= MAX_INPUTS_PER_REQUEST);
        if full {
            batches.push(start..i);
            start = i;
            running = 0;
        }
        running += count;
    }

    if start < token_counts.len() {
        batches.push(start..token_counts.len());
    }

    batches
}

/// Dense vectors from a hosted API
pub struct HostedVectorizer {
    client: Arc<dyn HostedEmbeddingClient>,
    tokenizer: Arc<dyn Tokenizer>,
    model: String,
    batch_token_cap: usize,
    price_per_1k_tokens: f64,
}

impl HostedVectorizer {
    pub fn new(
        client: Arc<dyn HostedEmbeddingClient>,
        tokenizer: Arc<dyn Tokenizer>,
        model: impl Into<String>,
        batch_token_cap: usize,
        price_per_1k_tokens: f64,
    ) -> Self {
        Self {
            client,
            tokenizer,
            model: model.into(),
            batch_token_cap,
            price_per_1k_tokens,
        }
    }

    /// Texts clipped to the per-request cap, with their token counts
    fn prepare(&self, texts: &[String]) -> (Vec<String>, Vec<usize>) {
        let mut prepared = Vec::with_capacity(texts.len());
        let mut counts = Vec::with_capacity(texts.len());

        for (position, text) in texts.iter().enumerate() {
            let count = self.tokenizer.count(text);
            if count > self.batch_token_cap {
                warn!(
                    "Text {} has {} tokens, truncating to batch cap {}",
                    position, count, self.batch_token_cap
                );
                let clipped = self.tokenizer.truncate(text, self.batch_token_cap);
                counts.push(self.tokenizer.count(&clipped));
                prepared.push(clipped);
            } else {
                counts.push(count);
                prepared.push(text.clone());
            }
        }

        (prepared, counts)
    }
}

impl Vectorizer for HostedVectorizer {
    fn vectorize(&self, texts: &[String], cancel: &CancelToken) -> Result<Vectorization> {
        let (prepared, counts) = self.prepare(texts);
        let batches = plan_batches(&counts, self.batch_token_cap);

        let mut vectors = Vec::with_capacity(texts.len());
        let mut usage = EmbeddingUsage::default();

        for range in batches {
            cancel.check(Stage::Vectorizing)?;

            let batch = &prepared[range.clone()];
            let (embedded, tokens) = self.client.embed(batch, &self.model)?;
            if embedded.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: embedded.len(),
                }
                .into());
            }

            debug!(
                "Embedded batch {}..{} ({} tokens billed)",
                range.start, range.end, tokens
            );

            usage.requests += 1;
            usage.tokens += tokens;
            vectors.extend(embedded.into_iter().map(PageVector::Dense));
        }

        usage.cost = usage.tokens as f64 / 1000.0 * self.price_per_1k_tokens;
        info!(
            "Hosted embedding: {} requests, {} tokens, cost {:.6}",
            usage.requests, usage.tokens, usage.cost
        );

        Ok(Vectorization {
            vectors,
            usage: Some(usage),
        })
    }

    fn backend(&self) -> VectorizerBackend {
        VectorizerBackend::Hosted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SiftError;
    use crate::tokens::WhitespaceTokenizer;
    use std::sync::Mutex;

    /// Records batch sizes and bills one token per word
    #[derive(Default)]
    struct RecordingClient {
        batches: Mutex<Vec<Vec<String>>>,
        drop_last: bool,
    }

    impl HostedEmbeddingClient for RecordingClient {
        fn embed(
            &self,
            texts: &[String],
            _model: &str,
        ) -> std::result::Result<(Vec<Vec<f32>>, usize), EmbeddingError> {
            self.batches.lock().unwrap().push(texts.to_vec());
            let tokens = texts.iter().map(|t| t.split_whitespace().count()).sum();
            let mut vectors: Vec<Vec<f32>> = texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0])
                .collect();
            if self.drop_last {
                vectors.pop();
            }
            Ok((vectors, tokens))
        }
    }

    fn vectorizer(client: Arc<RecordingClient>, cap: usize) -> HostedVectorizer {
        HostedVectorizer::new(client, Arc::new(WhitespaceTokenizer), "test-model", cap, 0.02)
    }

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_plan_batches_respects_cap() {
        let batches = plan_batches(&[3, 3, 3, 5, 1], 6);
        assert_eq!(batches, vec![0..2, 2..3, 3..5]);
    }

    #[test]
    fn test_plan_batches_oversized_alone() {
        assert_eq!(plan_batches(&[2, 10, 2], 5), vec![0..1, 1..2, 2..3]);
        assert!(plan_batches(&[], 5).is_empty());
    }

    #[test]
    fn test_plan_batches_input_limit() {
        let counts = vec![0; MAX_INPUTS_PER_REQUEST + 1];
        let batches = plan_batches(&counts, 100);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), MAX_INPUTS_PER_REQUEST);
    }

    #[test]
    fn test_vectors_in_input_order_with_usage() {
        let client = Arc::new(RecordingClient::default());
        let texts = vec![words(4), words(4), words(1)];

        let result = vectorizer(client.clone(), 5)
            .vectorize(&texts, &CancelToken::new())
            .unwrap();

        assert_eq!(result.vectors.len(), 3);
        let lengths: Vec<f32> = result
            .vectors
            .iter()
            .map(|v| v.as_dense().unwrap()[0])
            .collect();
        let expected: Vec<f32> = texts.iter().map(|t| t.len() as f32).collect();
        assert_eq!(lengths, expected);

        assert_eq!(client.batches.lock().unwrap().len(), 2);
        let usage = result.usage.unwrap();
        assert_eq!(usage.requests, 2);
        assert_eq!(usage.tokens, 9);
        assert!((usage.cost - 9.0 / 1000.0 * 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_oversized_text_truncated_to_cap() {
        let client = Arc::new(RecordingClient::default());
        vectorizer(client.clone(), 3)
            .vectorize(&[words(10)], &CancelToken::new())
            .unwrap();

        let batches = client.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0], words(3));
    }

    #[test]
    fn test_count_mismatch_is_error() {
        let client = Arc::new(RecordingClient {
            drop_last: true,
            ..Default::default()
        });
        let result = vectorizer(client, 100).vectorize(&[words(2)], &CancelToken::new());
        assert!(matches!(
            result,
            Err(SiftError::Embedding(EmbeddingError::CountMismatch { .. }))
        ));
    }

    #[test]
    fn test_cancel_stops_before_requests() {
        let client = Arc::new(RecordingClient::default());
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = vectorizer(client.clone(), 100).vectorize(&[words(2)], &cancel);
        assert!(matches!(result, Err(SiftError::Cancelled { .. })));
        assert!(client.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn test_client_requires_api_key() {
        let result =
            OpenAiEmbeddingClient::new(" ", "https://example.invalid/v1", Duration::from_secs(1));
        assert!(result.is_err());
    }
}
