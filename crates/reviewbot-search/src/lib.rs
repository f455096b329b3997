//! reviewbot search - tiered semantic retrieval over hotel reviews
//!
//! Answers a free-text question with the most relevant stored reviews, even
//! when the store only supports part of what a full vector search needs.
//!
//! # Tiers
//!
//! - **A** native vector search through the store's primary call shape
//! - **B** the same search through an alternate call shape
//! - **C** a declarative query ordered by vector distance
//! - **D** plain key lookup, unscored
//!
//! A cached capability probe skips the vector-index tiers when the index is
//! known to be missing. Every result is normalized into a
//! [`CanonicalResult`] whatever tier produced it.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use reviewbot_search::{
//!     create_provider, CouchbaseConfig, CouchbaseStore, EmbeddingConfig, RetrievalConfig,
//!     ReviewSearcher,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = CouchbaseStore::new(CouchbaseConfig::default())?;
//!     let provider = create_provider(&EmbeddingConfig::local())?;
//!     let searcher = ReviewSearcher::new(
//!         provider,
//!         Arc::new(store),
//!         RetrievalConfig::default(),
//!     );
//!
//!     for result in searcher.search("quiet rooms near the beach", 5).await? {
//!         println!("{} ({})", result.hotel_name, result.similarity);
//!     }
//!     Ok(())
//! }
//! ```

pub mod capability;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod query;
pub mod retrieval;
pub mod schema;
pub mod searcher;
pub mod store;
pub mod tier;

pub use capability::{CapabilityCache, CapabilityState, IndexAvailability};
pub use embeddings::{
    create_provider, embed_query, validate_dimension, EmbeddingConfig, EmbeddingProvider,
    EmbeddingProviderType, LocalProvider, OpenAIConfig, OpenAIProvider, ProviderStatus,
};
pub use error::{Result, SearchError};
pub use ingest::{read_hotels, IngestStats, ReviewIngestor};
pub use query::{EmbeddingVector, Query, DEFAULT_TOP_K};
pub use retrieval::{AttemptStatus, RetrievalConfig, RetrievalEngine, RetrievalOutcome, TierAttempt};
pub use schema::{CanonicalResult, HotelDocument, ReviewDocument, Similarity, EMBEDDING_DIM};
pub use searcher::ReviewSearcher;
pub use store::{CouchbaseConfig, CouchbaseStore, DocumentStore, QdrantConfig, QdrantStore};
pub use tier::SearchTier;
