//! Embedding generation for review search
//!
//! ```text
//! EmbeddingProvider (trait)
//!     ├── LocalProvider   - Candle + all-MiniLM-L6-v2
//!     └── OpenAIProvider  - HTTP client for /v1/embeddings
//! ```

pub mod factory;
mod local;
pub mod openai;
mod provider;

pub use factory::{create as create_provider, validate_dimension, EmbeddingConfig};
pub use local::{LocalProvider, DEFAULT_MODEL_ID};
pub use openai::{OpenAIConfig, OpenAIProvider};
pub use provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};

use crate::error::{Result, SearchError};
use crate::query::EmbeddingVector;
use crate::schema::EMBEDDING_DIM;

/// Embed a single query text, checking the vector against the index dimension.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<EmbeddingVector> {
    let mut vectors = provider.embed(vec![text.to_string()]).await?;
    if vectors.len() != 1 {
        return Err(SearchError::Embedding(format!(
            "provider returned {} vectors for one query",
            vectors.len()
        )));
    }
    EmbeddingVector::new(vectors.remove(0), EMBEDDING_DIM)
}
