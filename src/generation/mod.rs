//! Text generation over OpenAI-compatible chat completion APIs.
//!
//! [`ChatCompletionsClient`] talks to a single model; [`FallbackGenerator`] walks a chain of
//! clients so that a decommissioned or overloaded primary model degrades to the next one.

use crate::config::GenerationSettings;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while attempting generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Model is unknown, decommissioned, or the provider could not be reached.
    #[error("Generation model unavailable: {0}")]
    ModelUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate answer: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed or carried no text.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request passed to a generation provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// System instructions.
    pub system: String,
    /// User prompt containing context and question.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Hard cap on generated tokens.
    pub max_tokens: usize,
}

/// Interface implemented by generation providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Produce a completion for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Model identifier used for logging.
    fn model(&self) -> &str;
}

/// Client for a single model behind `/chat/completions`.
pub struct ChatCompletionsClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_retries: usize,
    backoff_base: Duration,
}

impl ChatCompletionsClient {
    /// Build a client for `model` using the shared generation settings.
    pub fn new(settings: &GenerationSettings, model: impl Into<String>) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .user_agent("docqa/generation")
            .timeout(settings.timeout)
            .build()
            .map_err(|error| GenerationError::ModelUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", settings.url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: model.into(),
            max_retries: settings.max_retries.max(1),
            backoff_base: Duration::from_millis(500),
        })
    }

    async fn send_once(&self, request: &GenerationRequest) -> Result<String, (bool, GenerationError)> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = self.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
            builder = builder.bearer_auth(key.trim());
        }

        let response = builder.send().await.map_err(|error| {
            let retryable = error.is_timeout() || error.is_connect();
            (
                retryable,
                GenerationError::ModelUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.endpoint
                )),
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(&self.model, status, body));
        }

        let parsed: ChatResponse = response.json().await.map_err(|error| {
            (
                false,
                GenerationError::InvalidResponse(format!("failed to decode response: {error}")),
            )
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                (
                    false,
                    GenerationError::InvalidResponse("response contained no choices".into()),
                )
            })
    }
}

fn classify_status(model: &str, status: StatusCode, body: String) -> (bool, GenerationError) {
    let lowered = body.to_ascii_lowercase();
    let model_missing = status == StatusCode::NOT_FOUND
        || lowered.contains("model_not_found")
        || lowered.contains("model_decommissioned")
        || lowered.contains("does not exist");
    if model_missing {
        return (
            false,
            GenerationError::ModelUnavailable(format!("{model} returned {status}: {body}")),
        );
    }
    let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
    (
        retryable,
        GenerationError::GenerationFailed(format!("{model} returned {status}: {body}")),
    )
}

#[async_trait]
impl GenerationClient for ChatCompletionsClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut attempt = 0usize;
        loop {
            match self.send_once(request).await {
                Ok(text) => return Ok(text),
                Err((retryable, error)) => {
                    attempt += 1;
                    if !retryable || attempt >= self.max_retries {
                        return Err(error);
                    }
                    let delay = self.backoff_base * (1 << attempt.min(4) as u32);
                    tracing::warn!(model = %self.model, attempt, error = %error, delay_ms = delay.as_millis() as u64, "Retrying generation request");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Tries each client in order until one succeeds.
pub struct FallbackGenerator {
    chain: Vec<Box<dyn GenerationClient>>,
}

impl FallbackGenerator {
    /// Chain of clients, primary first.
    pub fn new(chain: Vec<Box<dyn GenerationClient>>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl GenerationClient for FallbackGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut last_error = None;
        for client in &self.chain {
            match client.generate(request).await {
                Ok(text) => return Ok(text),
                Err(error) => {
                    tracing::warn!(model = %client.model(), error = %error, "Generation model failed; trying next");
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            GenerationError::ModelUnavailable("no generation models configured".into())
        }))
    }

    fn model(&self) -> &str {
        self.chain.first().map_or("none", |client| client.model())
    }
}

/// Build the configured model chain.
pub fn get_generation_client(
    settings: &GenerationSettings,
) -> Result<Arc<dyn GenerationClient>, GenerationError> {
    let chain = settings
        .models
        .iter()
        .map(|model| {
            ChatCompletionsClient::new(settings, model.clone())
                .map(|client| Box::new(client) as Box<dyn GenerationClient>)
        })
        .collect::<Result<Vec<_>, _>>()?;
    if chain.is_empty() {
        return Err(GenerationError::ModelUnavailable(
            "no generation models configured".into(),
        ));
    }
    Ok(Arc::new(FallbackGenerator::new(chain)))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
