use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_COLLECTION_NAME: &str = "policy-documents";
const DEFAULT_GENERATION_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_GENERATION_MODELS: [&str; 3] = [
    "meta-llama/llama-4-scout-17b-16e-instruct",
    "llama-3.3-70b-versatile",
    "llama-3.1-8b-instant",
];

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docqa server and CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the single shared collection holding every document partition.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding service settings.
    pub embedding: EmbeddingSettings,
    /// Generation service settings.
    pub generation: GenerationSettings,
    /// Document download and chunking settings.
    pub chunker: ChunkerSettings,
    /// Collection readiness and insertion settings.
    pub index: IndexSettings,
    /// Diversity-aware retrieval settings.
    pub retrieval: RetrievalSettings,
    /// Answer retry and normalization settings.
    pub answer: AnswerSettings,
    /// Request-level limits and pacing.
    pub query: QuerySettings,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime (`/api/embed`).
    Ollama,
    /// OpenAI-compatible embeddings API (`/embeddings`).
    OpenAI,
    /// Deterministic local hashing encoder; no network access.
    Hash,
}

/// Embedding service configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    /// Backend used to produce vectors.
    pub provider: EmbeddingProvider,
    /// Base URL of the embedding service; provider default when absent.
    pub url: Option<String>,
    /// Bearer token for hosted providers.
    pub api_key: Option<String>,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Width of the produced vectors; also the collection dimension.
    pub dimension: usize,
    /// Maximum number of texts sent per request.
    pub batch_size: usize,
    /// Attempts per batch before surfacing an error.
    pub max_retries: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Generation service configuration.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Base URL of the OpenAI-compatible chat completions API.
    pub url: String,
    /// Bearer token for the generation service.
    pub api_key: Option<String>,
    /// Model fallback chain, primary first.
    pub models: Vec<String>,
    /// Hard cap on generated tokens.
    pub max_tokens: usize,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Transport-level retries per model before falling back.
    pub max_retries: usize,
}

/// Chunker configuration.
#[derive(Debug, Clone)]
pub struct ChunkerSettings {
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of the same page.
    pub chunk_overlap: usize,
    /// Chunks shorter than this are discarded.
    pub min_length: usize,
    /// Download timeout.
    pub fetch_timeout: Duration,
}

/// Vector index configuration.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    /// Maximum time to wait for the shared collection to report ready.
    pub ready_timeout: Duration,
    /// Interval between readiness probes.
    pub ready_poll_interval: Duration,
}

/// Retrieval configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalSettings {
    /// Passages returned per query.
    pub k: usize,
    /// Candidate pool size considered by the diversity selection.
    pub fetch_k: usize,
    /// Relevance weight: 1.0 is pure relevance, 0.0 pure diversity.
    pub lambda: f32,
}

/// Answer pipeline configuration.
#[derive(Debug, Clone)]
pub struct AnswerSettings {
    /// Maximum generation attempts per question.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Maximum passages included in the prompt context.
    pub max_passages: usize,
    /// Token budget for the prompt context.
    pub max_context_tokens: usize,
    /// Hard ceiling on the final answer length in characters.
    pub max_answer_chars: usize,
}

/// Request-level configuration.
#[derive(Debug, Clone)]
pub struct QuerySettings {
    /// Upper bound on questions per request.
    pub max_questions: usize,
    /// Pause inserted between consecutive questions.
    pub question_pause: Duration,
}

impl Default for ChunkerSettings {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
            min_length: 50,
            fetch_timeout: Duration::from_secs(60),
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(120),
            ready_poll_interval: Duration::from_secs(1),
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k: 8,
            fetch_k: 20,
            lambda: 0.5,
        }
    }
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            max_passages: 5,
            max_context_tokens: 2000,
            max_answer_chars: 300,
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_questions: 25,
            question_pause: Duration::from_millis(200),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_GENERATION_URL.to_string(),
            api_key: None,
            models: DEFAULT_GENERATION_MODELS
                .iter()
                .map(|model| model.to_string())
                .collect(),
            max_tokens: 150,
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let chunker_defaults = ChunkerSettings::default();
        let index_defaults = IndexSettings::default();
        let retrieval_defaults = RetrievalSettings::default();
        let answer_defaults = AnswerSettings::default();
        let query_defaults = QuerySettings::default();
        let generation_defaults = GenerationSettings::default();

        let embedding = EmbeddingSettings {
            provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            url: load_env_optional("EMBEDDING_URL"),
            api_key: load_env_optional("EMBEDDING_API_KEY"),
            model: load_env("EMBEDDING_MODEL")?,
            dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 64)?,
            max_retries: parse_env_or("EMBEDDING_MAX_RETRIES", 3)?,
            timeout: Duration::from_secs(parse_env_or("EMBEDDING_TIMEOUT_SECS", 60)?),
        };

        let generation = GenerationSettings {
            url: load_env_optional("GENERATION_URL").unwrap_or(generation_defaults.url),
            api_key: load_env_optional("GENERATION_API_KEY"),
            models: load_env_optional("GENERATION_MODELS")
                .map(|value| parse_model_chain(&value))
                .filter(|models| !models.is_empty())
                .unwrap_or(generation_defaults.models),
            max_tokens: parse_env_or("GENERATION_MAX_TOKENS", generation_defaults.max_tokens)?,
            timeout: Duration::from_secs(parse_env_or(
                "GENERATION_TIMEOUT_SECS",
                generation_defaults.timeout.as_secs(),
            )?),
            max_retries: parse_env_or("GENERATION_MAX_RETRIES", generation_defaults.max_retries)?,
        };

        let chunker = ChunkerSettings {
            chunk_size: parse_env_or("CHUNK_SIZE", chunker_defaults.chunk_size)?,
            chunk_overlap: parse_env_or("CHUNK_OVERLAP", chunker_defaults.chunk_overlap)?,
            min_length: parse_env_or("CHUNK_MIN_LENGTH", chunker_defaults.min_length)?,
            fetch_timeout: Duration::from_secs(parse_env_or(
                "FETCH_TIMEOUT_SECS",
                chunker_defaults.fetch_timeout.as_secs(),
            )?),
        };

        let index = IndexSettings {
            ready_timeout: Duration::from_secs(parse_env_or(
                "INDEX_READY_TIMEOUT_SECS",
                index_defaults.ready_timeout.as_secs(),
            )?),
            ready_poll_interval: index_defaults.ready_poll_interval,
        };

        let retrieval = RetrievalSettings {
            k: parse_env_or("RETRIEVAL_K", retrieval_defaults.k)?,
            fetch_k: parse_env_or("RETRIEVAL_FETCH_K", retrieval_defaults.fetch_k)?,
            lambda: parse_env_or("RETRIEVAL_LAMBDA", retrieval_defaults.lambda)?.clamp(0.0, 1.0),
        };

        let answer = AnswerSettings {
            max_attempts: parse_env_or("ANSWER_MAX_ATTEMPTS", answer_defaults.max_attempts)?,
            retry_delay: Duration::from_millis(parse_env_or(
                "ANSWER_RETRY_DELAY_MS",
                answer_defaults.retry_delay.as_millis() as u64,
            )?),
            max_passages: parse_env_or("CONTEXT_MAX_PASSAGES", answer_defaults.max_passages)?,
            max_context_tokens: parse_env_or(
                "CONTEXT_MAX_TOKENS",
                answer_defaults.max_context_tokens,
            )?,
            max_answer_chars: answer_defaults.max_answer_chars,
        };

        let query = QuerySettings {
            max_questions: parse_env_or("MAX_QUESTIONS", query_defaults.max_questions)?,
            question_pause: Duration::from_millis(parse_env_or(
                "QUESTION_PAUSE_MS",
                query_defaults.question_pause.as_millis() as u64,
            )?),
        };

        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env_optional("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding,
            generation,
            chunker,
            index,
            retrieval,
            answer,
            query,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Split a comma-separated model chain, dropping blanks.
fn parse_model_chain(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .map(str::to_string)
        .collect()
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        server_port = ?config.server_port,
        embedding_provider = ?config.embedding.provider,
        generation_models = ?config.generation.models,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
