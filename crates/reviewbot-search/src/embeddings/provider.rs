//! The text-to-vector seam shared by the local and remote providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Which embedding backend produces the query vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderType {
    /// all-MiniLM-L6-v2 run in-process with Candle
    #[default]
    Local,
    /// Any `/v1/embeddings` endpoint (OpenAI, Azure, Ollama)
    Openai,
}

impl EmbeddingProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            EmbeddingProviderType::Local => "local",
            EmbeddingProviderType::Openai => "openai",
        }
    }
}

impl std::fmt::Display for EmbeddingProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot reported by `reviewbot status`.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub available: bool,
    pub provider_type: EmbeddingProviderType,
    /// `cpu`, `metal`, `cuda` or `Remote`
    pub device: String,
    pub latency_ms: Option<u64>,
    /// Weights in memory, or a remote endpoint that has answered
    pub model_ready: bool,
    pub error: Option<String>,
}

impl ProviderStatus {
    pub fn healthy(provider_type: EmbeddingProviderType, device: impl Into<String>) -> Self {
        Self {
            available: true,
            provider_type,
            device: device.into(),
            latency_ms: None,
            model_ready: true,
            error: None,
        }
    }

    pub fn unavailable(provider_type: EmbeddingProviderType, error: impl Into<String>) -> Self {
        Self {
            available: false,
            provider_type,
            device: "N/A".into(),
            latency_ms: None,
            model_ready: false,
            error: Some(error.into()),
        }
    }

    pub fn with_latency(self, latency_ms: u64) -> Self {
        Self {
            latency_ms: Some(latency_ms),
            ..self
        }
    }

    /// Turn an unavailable status into a `ProviderUnavailable` error.
    pub fn into_ready(self) -> Result<()> {
        if self.available {
            return Ok(());
        }
        Err(SearchError::ProviderUnavailable(self.error.unwrap_or_else(
            || format!("{} embedding provider not ready", self.provider_type),
        )))
    }
}

/// Converts review text and queries into fixed-length vectors.
///
/// The same model must embed both sides of a comparison. Failures surface
/// as errors; a provider never substitutes a zero or placeholder vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per input text, same order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    async fn check_status(&self) -> Result<ProviderStatus>;

    /// Pay model loading or connection setup before the first question.
    async fn warmup(&self) -> Result<()>;

    fn embedding_dim(&self) -> usize;

    fn provider_type(&self) -> EmbeddingProviderType;
}
