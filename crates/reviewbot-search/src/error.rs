//! Error types for reviewbot-search

use thiserror::Error;

/// Errors that can occur in reviewbot-search operations
///
/// The retrieval engine resolves most of these internally: only
/// [`SearchError::Connectivity`] and embedding failures are surfaced to the
/// caller of a search.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The document store could not be reached (fatal for the query)
    #[error("Search unavailable: {0}")]
    Connectivity(String),

    /// The store does not support the requested call shape
    #[error("Interface not supported by store: {0}")]
    InterfaceMismatch(String),

    /// The vector index (or collection) is not present on the store
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Malformed or missing data returned by the store
    #[error("Data error: {0}")]
    Data(String),

    /// A bounded store call exceeded its timeout
    #[error("Store call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The query was rejected before any search ran
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // =========================================================================
    // Provider errors
    // =========================================================================
    /// Embedding provider unavailable
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Embedding dimension mismatch
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// OpenAI authentication failed
    #[error("OpenAI authentication failed: {0}")]
    OpenAIAuth(String),

    /// OpenAI rate limited
    #[error("OpenAI rate limited, retry after {retry_after:?} seconds")]
    OpenAIRateLimit { retry_after: Option<u64> },

    /// OpenAI model not found
    #[error("OpenAI model not found: {0}")]
    OpenAIInvalidModel(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchError {
    /// Whether this error means the request shape itself was rejected.
    pub fn is_interface_mismatch(&self) -> bool {
        matches!(self, SearchError::InterfaceMismatch(_))
    }

    /// Whether this error comes from the embedding side of the pipeline.
    pub fn is_embedding_failure(&self) -> bool {
        matches!(
            self,
            SearchError::Embedding(_)
                | SearchError::ProviderUnavailable(_)
                | SearchError::DimensionMismatch { .. }
                | SearchError::OpenAIAuth(_)
                | SearchError::OpenAIRateLimit { .. }
                | SearchError::OpenAIInvalidModel(_)
        )
    }

    /// Whether this error means the store as a whole is unusable.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SearchError::Connectivity(_))
    }
}

impl From<qdrant_client::QdrantError> for SearchError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        crate::store::qdrant::classify_error(&err.to_string())
    }
}

impl From<candle_core::Error> for SearchError {
    fn from(err: candle_core::Error) -> Self {
        SearchError::Embedding(err.to_string())
    }
}

/// Result type for reviewbot-search operations
pub type Result<T> = std::result::Result<T, SearchError>;
