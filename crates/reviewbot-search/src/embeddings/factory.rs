//! Provider factory for creating embedding providers from configuration

use std::sync::Arc;

use crate::error::{Result, SearchError};
use crate::schema::EMBEDDING_DIM;

use super::local::{LocalProvider, DEFAULT_MODEL_ID};
use super::openai::{OpenAIConfig, OpenAIProvider};
use super::provider::{EmbeddingProvider, EmbeddingProviderType};

/// Configuration for embedding providers
///
/// Provider-specific settings are optional; the OpenAI provider falls back to
/// environment variables when none are given.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderType,
    /// HuggingFace model id for the local provider
    pub local_model: Option<String>,
    /// OpenAI provider settings (used when provider = Openai)
    pub openai: Option<OpenAIConfig>,
}

impl EmbeddingConfig {
    /// Local provider with the default model
    pub fn local() -> Self {
        Self::default()
    }

    /// OpenAI-compatible provider with explicit settings
    pub fn openai_with_config(config: OpenAIConfig) -> Self {
        Self {
            provider: EmbeddingProviderType::Openai,
            local_model: None,
            openai: Some(config),
        }
    }

    /// OpenAI-compatible provider configured from the environment
    pub fn openai() -> Self {
        Self {
            provider: EmbeddingProviderType::Openai,
            local_model: None,
            openai: None,
        }
    }
}

/// Check that a provider produces vectors the review index can hold
pub fn validate_dimension(provider: &dyn EmbeddingProvider) -> Result<()> {
    let actual = provider.embedding_dim();
    if actual != EMBEDDING_DIM {
        return Err(SearchError::DimensionMismatch {
            expected: EMBEDDING_DIM,
            actual,
        });
    }
    Ok(())
}

/// Create an embedding provider from configuration
///
/// The returned provider can be shared across tasks.
pub fn create(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderType::Local => Arc::new(LocalProvider::with_model(
            config.local_model.as_deref().unwrap_or(DEFAULT_MODEL_ID),
        )?),
        EmbeddingProviderType::Openai => {
            let provider = match &config.openai {
                Some(openai) => OpenAIProvider::new(openai.clone())?,
                None => OpenAIProvider::from_env()?,
            };
            Arc::new(provider)
        }
    };

    validate_dimension(provider.as_ref())?;
    Ok(provider)
}
