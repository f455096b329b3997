//! Document store abstraction
//!
//! A store may expose any subset of the capabilities the retrieval tiers
//! rely on:
//!
//! ```text
//! DocumentStore (trait)
//!     ├── CouchbaseStore  - Search service (k-NN), Query service (SQL++), data REST
//!     └── QdrantStore     - Query API / legacy search, scroll, point lookup
//! ```
//!
//! Unsupported calls fail with [`SearchError::InterfaceMismatch`], which the
//! retrieval engine treats as "try the next tier".
//!
//! [`SearchError::InterfaceMismatch`]: crate::error::SearchError::InterfaceMismatch

pub mod couchbase;
pub mod qdrant;
pub mod sqlpp;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{Result, SearchError};
use crate::query::EmbeddingVector;
use crate::schema::{RawHit, ReviewDocument};

pub use couchbase::{CouchbaseConfig, CouchbaseStore, ServiceEndpoints};
pub use qdrant::{QdrantConfig, QdrantStore};

/// Fully qualified location of a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    pub bucket: String,
    pub scope: String,
    pub collection: String,
}

impl Keyspace {
    pub fn new(
        bucket: impl Into<String>,
        scope: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            scope: scope.into(),
            collection: collection.into(),
        }
    }

    /// Same bucket and scope, different collection
    pub fn sibling(&self, collection: impl Into<String>) -> Self {
        Self {
            bucket: self.bucket.clone(),
            scope: self.scope.clone(),
            collection: collection.into(),
        }
    }
}

impl std::fmt::Display for Keyspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "`{}`.`{}`.`{}`", self.bucket, self.scope, self.collection)
    }
}

/// Call convention for a vector search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorShape {
    /// The store's current vector search API
    Primary,
    /// The older convention of the same engine
    Alternate,
}

/// A k-nearest-neighbor request against a vector index
#[derive(Debug, Clone)]
pub struct VectorSearchRequest {
    /// Vector index name
    pub index: String,
    /// Document field holding the embedding
    pub field: String,
    /// Query embedding
    pub vector: EmbeddingVector,
    /// Number of hits to return
    pub limit: usize,
    /// Number of candidates the engine examines internally
    pub candidates: usize,
    /// Stored fields to return with each hit
    pub return_fields: Vec<String>,
}

/// A declarative query, rendered by each store into its own dialect
///
/// Values (the query vector, limits, names) are always sent as bound
/// parameters, never spliced into statement text.
#[derive(Debug, Clone)]
pub enum DeclarativeQuery {
    /// Rows ordered by ascending distance between `field` and `vector`
    VectorDistance {
        field: String,
        vector: EmbeddingVector,
        limit: usize,
    },
    /// Up to `limit` document keys as `doc_id` rows
    ListKeys { limit: usize },
    /// Metadata lookup of an index by name; one row per match
    IndexLookup { index: String },
    /// Source hotel documents for ingestion
    SourceHotels { limit: Option<usize> },
}

impl DeclarativeQuery {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            DeclarativeQuery::VectorDistance { .. } => "vector-distance",
            DeclarativeQuery::ListKeys { .. } => "list-keys",
            DeclarativeQuery::IndexLookup { .. } => "index-lookup",
            DeclarativeQuery::SourceHotels { .. } => "source-hotels",
        }
    }
}

/// A search index as reported by the store's management interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub name: String,
    /// Store-specific index type (e.g. "fulltext-index", "collection")
    pub kind: String,
    /// Dimension of the vector mapping, when reported
    pub vector_dims: Option<usize>,
}

/// Client for a remote document store
///
/// All methods are bounded round trips; callers apply their own timeouts on
/// top of the transport's.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs and status output
    fn backend_name(&self) -> &'static str;

    /// Name of the configured vector index
    fn index_name(&self) -> &str;

    /// Run a k-NN query using the given call convention
    async fn vector_search(
        &self,
        request: &VectorSearchRequest,
        shape: VectorShape,
    ) -> Result<Vec<RawHit>>;

    /// Run a declarative query, returning its rows
    async fn query(&self, query: &DeclarativeQuery) -> Result<Vec<Value>>;

    /// Fetch a document by key; `None` when the key does not exist
    async fn get_by_key(&self, id: &str) -> Result<Option<Map<String, Value>>>;

    /// Enumerate server-managed search indexes
    async fn list_indexes(&self) -> Result<Vec<IndexDescriptor>>;

    /// Check that the store answers at all
    async fn ping(&self) -> Result<()>;

    /// Write a review vector document
    async fn upsert(&self, id: &str, _document: &ReviewDocument) -> Result<()> {
        Err(SearchError::InterfaceMismatch(format!(
            "{} store does not accept writes (key {})",
            self.backend_name(),
            id
        )))
    }
}
