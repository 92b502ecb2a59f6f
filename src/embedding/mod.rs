//! Embedding client abstraction and adapters.
//!
//! Hosted providers are called over HTTP in batches no larger than the configured batch size;
//! transient failures (429, 5xx, timeouts, dropped connections) are retried with a capped
//! exponential backoff before the batch fails.

use crate::config::{EmbeddingProvider, EmbeddingSettings};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be configured or reached.
    #[error("Embedding provider unavailable: {0}")]
    Unavailable(String),
    /// Provider returned vectors of the wrong shape.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Dimension returned by the provider.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;

    /// Width of the vectors this client produces.
    fn dimension(&self) -> usize;
}

/// Deterministic local encoder that hashes bytes into a normalized vector.
///
/// Useful for offline runs and tests; similarity is lexical rather than semantic.
pub struct HashingEmbeddingClient {
    dimension: usize,
}

impl HashingEmbeddingClient {
    /// Construct a hashing client producing vectors of `dimension` width.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Encode a single text. Tokens are hashed into buckets, then the vector is L2-normalized.
    pub fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() || dimension == 0 {
            return embedding;
        }

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let lowered = token.to_lowercase();
            let bucket = fnv1a(lowered.as_bytes()) as usize % dimension;
            embedding[bucket] += 1.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingClient for HashingEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// HTTP embedding client for OpenAI-compatible and Ollama endpoints.
pub struct HttpEmbeddingClient {
    http: Client,
    provider: EmbeddingProvider,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    batch_size: usize,
    max_retries: usize,
    backoff_base: Duration,
}

impl HttpEmbeddingClient {
    /// Build a client for the configured hosted provider.
    pub fn new(settings: &EmbeddingSettings) -> Result<Self, EmbeddingClientError> {
        let (default_url, path) = match settings.provider {
            EmbeddingProvider::OpenAI => (DEFAULT_OPENAI_URL, "embeddings"),
            EmbeddingProvider::Ollama => (DEFAULT_OLLAMA_URL, "api/embed"),
            EmbeddingProvider::Hash => {
                return Err(EmbeddingClientError::Unavailable(
                    "hash provider has no HTTP endpoint".into(),
                ));
            }
        };
        if settings.model.trim().is_empty() {
            return Err(EmbeddingClientError::Unavailable(
                "missing embedding model name".into(),
            ));
        }

        let base = settings.url.as_deref().unwrap_or(default_url);
        let http = Client::builder()
            .user_agent("docqa/embeddings")
            .timeout(settings.timeout)
            .build()
            .map_err(|error| EmbeddingClientError::Unavailable(error.to_string()))?;

        Ok(Self {
            http,
            provider: settings.provider,
            endpoint: format!("{}/{path}", base.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            dimension: settings.dimension,
            batch_size: settings.batch_size.max(1),
            max_retries: settings.max_retries.max(1),
            backoff_base: Duration::from_millis(500),
        })
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let mut attempt = 0usize;
        loop {
            let mut request = self.http.post(&self.endpoint).json(&EmbeddingRequest {
                model: &self.model,
                input: inputs,
            });
            if let Some(key) = self.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
                request = request.bearer_auth(key.trim());
            }

            let outcome = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    return self.parse_response(response, inputs.len()).await;
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let error = EmbeddingClientError::GenerationFailed(format!(
                        "provider returned {status}: {body}"
                    ));
                    (should_retry_status(status), error)
                }
                Err(error) => (
                    is_retryable_error(&error),
                    EmbeddingClientError::Unavailable(format!(
                        "failed to reach {}: {error}",
                        self.endpoint
                    )),
                ),
            };

            let (retryable, error) = outcome;
            attempt += 1;
            if !retryable || attempt >= self.max_retries {
                tracing::error!(error = %error, attempt, "Embedding batch failed");
                return Err(error);
            }
            let delay = self.retry_backoff(attempt);
            tracing::warn!(error = %error, attempt, delay_ms = delay.as_millis() as u64, "Retrying embedding batch");
            tokio::time::sleep(delay).await;
        }
    }

    async fn parse_response(
        &self,
        response: reqwest::Response,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let vectors = match self.provider {
            EmbeddingProvider::Ollama => {
                let body: OllamaEmbedResponse = response.json().await.map_err(|error| {
                    EmbeddingClientError::GenerationFailed(format!("malformed response: {error}"))
                })?;
                body.embeddings
            }
            _ => {
                let mut body: OpenAiEmbeddingResponse =
                    response.json().await.map_err(|error| {
                        EmbeddingClientError::GenerationFailed(format!(
                            "malformed response: {error}"
                        ))
                    })?;
                body.data.sort_by_key(|entry| entry.index);
                body.data.into_iter().map(|entry| entry.embedding).collect()
            }
        };

        if vectors.len() != expected {
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "provider returned {} embeddings for {expected} inputs",
                vectors.len()
            )));
        }
        if let Some(actual) = vectors
            .iter()
            .map(Vec::len)
            .find(|len| *len != self.dimension)
        {
            return Err(EmbeddingClientError::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }
        Ok(vectors)
    }

    fn retry_backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        self.backoff_base * (1 << capped)
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        tracing::debug!(
            provider = ?self.provider,
            model = %self.model,
            texts = texts.len(),
            batch_size = self.batch_size,
            "Generating embeddings"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Build an embedding client suitable for the configured provider.
pub fn get_embedding_client(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
    match settings.provider {
        EmbeddingProvider::Hash => Ok(Arc::new(HashingEmbeddingClient::new(settings.dimension))),
        EmbeddingProvider::OpenAI | EmbeddingProvider::Ollama => {
            Ok(Arc::new(HttpEmbeddingClient::new(settings)?))
        }
    }
}
