//! OpenAI-compatible embedding provider
//!
//! Talks to any `/v1/embeddings` endpoint: OpenAI, Azure OpenAI, or an Ollama
//! serving `all-minilm`, which is the model the local provider runs.
//!
//! Requests carry `dimensions` when configured so that `text-embedding-3-*`
//! models shorten their output to the review index dimension. Every returned
//! vector is checked against the expected dimension; a model that disagrees is
//! an error, never a truncated vector.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};
use crate::error::{Result, SearchError};
use crate::schema::EMBEDDING_DIM;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "text-embedding-3-small";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;
const FIRST_BACKOFF: Duration = Duration::from_millis(500);
/// Upper bound on a server-requested `Retry-After` wait
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Settings for an OpenAI-compatible endpoint
#[derive(Clone)]
pub struct OpenAIConfig {
    /// API root, with or without a trailing `/v1`
    pub base_url: String,
    /// Not needed by local servers such as Ollama
    pub api_key: Option<String>,
    pub model: String,
    /// Output dimension to request; `None` leaves the model's native size
    pub dimensions: Option<usize>,
    pub timeout_secs: u64,
    /// Retries after the first attempt, for transient failures only
    pub max_retries: u32,
    /// Send the key as an `api-key` header (Azure) rather than a bearer token
    pub azure_mode: bool,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: OPENAI_BASE_URL.into(),
            api_key: None,
            model: OPENAI_MODEL.into(),
            dimensions: Some(EMBEDDING_DIM),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            azure_mode: false,
        }
    }
}

impl OpenAIConfig {
    /// Ollama serving all-minilm on its default port
    pub fn ollama() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".into(),
            model: "all-minilm".into(),
            dimensions: None,
            ..Default::default()
        }
    }

    /// OpenAI, shortened to the review index dimension
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Settings from `REVIEWBOT_OPENAI_{BASE_URL,API_KEY,MODEL,AZURE_MODE}`
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let model = var("REVIEWBOT_OPENAI_MODEL").unwrap_or_else(|| OPENAI_MODEL.into());
        Self {
            base_url: var("REVIEWBOT_OPENAI_BASE_URL").unwrap_or_else(|| OPENAI_BASE_URL.into()),
            api_key: var("REVIEWBOT_OPENAI_API_KEY"),
            dimensions: model.starts_with("text-embedding-3").then_some(EMBEDDING_DIM),
            azure_mode: var("REVIEWBOT_OPENAI_AZURE_MODE")
                .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
            model,
            ..Default::default()
        }
    }

    /// Dimension the configured model will return
    fn output_dim(&self) -> usize {
        if let Some(dimensions) = self.dimensions {
            return dimensions;
        }
        match self.model.as_str() {
            "all-minilm" | "all-minilm:l6-v2" | "all-MiniLM-L6-v2" => 384,
            "nomic-embed-text" => 768,
            "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
            "text-embedding-3-large" => 3072,
            _ => EMBEDDING_DIM,
        }
    }

    fn embeddings_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match base.strip_suffix("/v1") {
            Some(_) => format!("{}/embeddings", base),
            None => format!("{}/v1/embeddings", base),
        }
    }
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("azure_mode", &self.azure_mode)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedItem>,
}

#[derive(Deserialize)]
struct EmbedItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Map a non-success response onto the error taxonomy
fn classify(status: StatusCode, body: &str, retry_after: Option<u64>, model: &str) -> SearchError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SearchError::OpenAIAuth(body.into()),
        StatusCode::NOT_FOUND => SearchError::OpenAIInvalidModel(format!("{}: {}", model, body)),
        StatusCode::TOO_MANY_REQUESTS => SearchError::OpenAIRateLimit { retry_after },
        _ => SearchError::ProviderUnavailable(format!("{} answered {}: {}", model, status, body)),
    }
}

/// Wait before retry number `attempt` (0-based), or `None` when `err` is permanent
fn backoff(attempt: u32, err: &SearchError) -> Option<Duration> {
    match err {
        SearchError::OpenAIRateLimit {
            retry_after: Some(secs),
        } => Some(Duration::from_secs(*secs).min(MAX_BACKOFF)),
        SearchError::OpenAIRateLimit { retry_after: None } | SearchError::ProviderUnavailable(_) => {
            Some(FIRST_BACKOFF * 2u32.saturating_pow(attempt))
        }
        _ => None,
    }
}

/// Embedding provider backed by an OpenAI-compatible HTTP API
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
    dim: usize,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::ProviderUnavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            dim: config.output_dim(),
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// One round trip, no retries
    async fn post(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbedRequest {
            model: &self.config.model,
            input: texts,
            dimensions: self.config.dimensions,
        };
        let mut request = self.client.post(self.config.embeddings_url()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = if self.config.azure_mode {
                request.header("api-key", key)
            } else {
                request.bearer_auth(key)
            };
        }

        let response = request.send().await.map_err(|e| {
            let what = if e.is_timeout() {
                "timed out"
            } else if e.is_connect() {
                "connection failed"
            } else {
                "request failed"
            };
            SearchError::ProviderUnavailable(format!("{}: {}", what, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(classify(status, &text, retry_after, &self.config.model));
        }

        let mut parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Embedding(format!("unreadable response: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(SearchError::Embedding(format!(
                "sent {} texts, received {} vectors",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|item| item.index);

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|i| i.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(SearchError::Embedding(format!(
                "{} returned {}-dimensional vectors, expected {}",
                self.config.model,
                bad.len(),
                self.dim
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 0;
        loop {
            let err = match self.post(&texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) => err,
            };
            let wait = match backoff(attempt, &err) {
                Some(wait) if attempt < self.config.max_retries => wait,
                _ => return Err(err),
            };
            warn!(
                "Embedding request failed (attempt {}), retrying in {:?}: {}",
                attempt + 1,
                wait,
                err
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        let started = Instant::now();
        let probe = vec!["status check".to_string()];
        let status = match self.post(&probe).await {
            // A throttled endpoint is still a reachable one
            Ok(_) | Err(SearchError::OpenAIRateLimit { .. }) => {
                ProviderStatus::healthy(EmbeddingProviderType::Openai, "Remote")
                    .with_latency(started.elapsed().as_millis() as u64)
            }
            Err(e) => ProviderStatus::unavailable(EmbeddingProviderType::Openai, e.to_string()),
        };
        debug!("OpenAI provider status: {:?}", status);
        Ok(status)
    }

    async fn warmup(&self) -> Result<()> {
        self.check_status().await?.into_ready()
    }

    fn embedding_dim(&self) -> usize {
        self.dim
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Openai
    }
}

impl std::fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("config", &self.config)
            .field("dim", &self.dim)
            .finish()
    }
}
