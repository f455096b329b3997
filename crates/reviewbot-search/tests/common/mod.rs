//! Common test utilities for reviewbot-search integration tests.
//!
//! `MockStore` answers every store call from a script and records the calls
//! it received; `FakeProvider` produces deterministic embeddings.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use reviewbot_search::schema::{RawHit, ReviewDocument, EMBEDDING_DIM};
use reviewbot_search::store::{
    DeclarativeQuery, DocumentStore, IndexDescriptor, VectorSearchRequest, VectorShape,
};
use reviewbot_search::{
    EmbeddingProvider, EmbeddingProviderType, ProviderStatus, Result, SearchError,
};

pub const INDEX: &str = "review_vector_idx";

/// Scripted failure modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fail {
    Mismatch,
    NotFound,
    Unreachable,
    Data,
    Timeout,
    /// Never answers; the caller's timeout must fire
    Hang,
}

pub type Reply<T> = std::result::Result<T, Fail>;

async fn resolve<T>(reply: Reply<T>) -> Result<T> {
    match reply {
        Ok(v) => Ok(v),
        Err(Fail::Mismatch) => Err(SearchError::InterfaceMismatch("scripted".into())),
        Err(Fail::NotFound) => Err(SearchError::IndexNotFound("scripted".into())),
        Err(Fail::Unreachable) => Err(SearchError::Connectivity("scripted".into())),
        Err(Fail::Data) => Err(SearchError::Data("scripted".into())),
        Err(Fail::Timeout) => Err(SearchError::Timeout(Duration::from_millis(1))),
        Err(Fail::Hang) => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(SearchError::Data("hang ended".into()))
        }
    }
}

/// Document store whose answers are fixed up front
pub struct MockStore {
    pub primary: Reply<Vec<RawHit>>,
    pub alternate: Reply<Vec<RawHit>>,
    pub distance: Reply<Vec<Value>>,
    pub list_keys: Reply<Vec<Value>>,
    pub index_lookup: Reply<Vec<Value>>,
    pub source_hotels: Reply<Vec<Value>>,
    pub indexes: Reply<Vec<IndexDescriptor>>,
    pub documents: BTreeMap<String, Map<String, Value>>,
    pub fetch_failure: Option<Fail>,
    pub upsert_failure: Option<Fail>,
    pub calls: Mutex<Vec<String>>,
    pub requests: Mutex<Vec<VectorSearchRequest>>,
    pub written: Mutex<BTreeMap<String, ReviewDocument>>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self {
            primary: Ok(Vec::new()),
            alternate: Ok(Vec::new()),
            distance: Ok(Vec::new()),
            list_keys: Ok(Vec::new()),
            index_lookup: Ok(Vec::new()),
            source_hotels: Ok(Vec::new()),
            indexes: Ok(vec![IndexDescriptor {
                name: INDEX.into(),
                kind: "fulltext-index".into(),
                vector_dims: Some(EMBEDDING_DIM),
            }]),
            documents: BTreeMap::new(),
            fetch_failure: None,
            upsert_failure: None,
            calls: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            written: Mutex::new(BTreeMap::new()),
        }
    }
}

impl MockStore {
    /// Store where every remote call fails as unreachable
    pub fn unreachable() -> Self {
        Self {
            primary: Err(Fail::Unreachable),
            alternate: Err(Fail::Unreachable),
            distance: Err(Fail::Unreachable),
            list_keys: Err(Fail::Unreachable),
            index_lookup: Err(Fail::Unreachable),
            source_hotels: Err(Fail::Unreachable),
            indexes: Err(Fail::Unreachable),
            fetch_failure: Some(Fail::Unreachable),
            upsert_failure: Some(Fail::Unreachable),
            ..Default::default()
        }
    }

    /// Add documents reachable through key listing and fetch
    pub fn with_documents(mut self, docs: &[(&str, &str)]) -> Self {
        let mut keys = Vec::new();
        for (key, hotel) in docs {
            self.documents.insert(key.to_string(), review_body(hotel));
            keys.push(json!({ "doc_id": key }));
        }
        self.list_keys = Ok(keys);
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn requests(&self) -> Vec<VectorSearchRequest> {
        self.requests.lock().clone()
    }

    pub fn written(&self) -> BTreeMap<String, ReviewDocument> {
        self.written.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl DocumentStore for MockStore {
    fn backend_name(&self) -> &'static str {
        "mock"
    }

    fn index_name(&self) -> &str {
        INDEX
    }

    async fn vector_search(
        &self,
        request: &VectorSearchRequest,
        shape: VectorShape,
    ) -> Result<Vec<RawHit>> {
        self.requests.lock().push(request.clone());
        match shape {
            VectorShape::Primary => {
                self.record("vector:primary");
                resolve(self.primary.clone()).await
            }
            VectorShape::Alternate => {
                self.record("vector:alternate");
                resolve(self.alternate.clone()).await
            }
        }
    }

    async fn query(&self, query: &DeclarativeQuery) -> Result<Vec<Value>> {
        self.record(format!("query:{}", query.kind()));
        match query {
            DeclarativeQuery::VectorDistance { .. } => resolve(self.distance.clone()).await,
            DeclarativeQuery::ListKeys { .. } => resolve(self.list_keys.clone()).await,
            DeclarativeQuery::IndexLookup { .. } => resolve(self.index_lookup.clone()).await,
            DeclarativeQuery::SourceHotels { limit } => {
                let mut rows = resolve(self.source_hotels.clone()).await?;
                if let Some(limit) = limit {
                    rows.truncate(*limit);
                }
                Ok(rows)
            }
        }
    }

    async fn get_by_key(&self, id: &str) -> Result<Option<Map<String, Value>>> {
        self.record(format!("get:{}", id));
        if let Some(fail) = self.fetch_failure {
            return resolve(Err(fail)).await;
        }
        Ok(self.documents.get(id).cloned())
    }

    async fn list_indexes(&self) -> Result<Vec<IndexDescriptor>> {
        self.record("list_indexes");
        resolve(self.indexes.clone()).await
    }

    async fn ping(&self) -> Result<()> {
        self.record("ping");
        Ok(())
    }

    async fn upsert(&self, id: &str, document: &ReviewDocument) -> Result<()> {
        self.record(format!("upsert:{}", id));
        if let Some(fail) = self.upsert_failure {
            return resolve(Err(fail)).await;
        }
        self.written.lock().insert(id.to_string(), document.clone());
        Ok(())
    }
}

/// Stored review fields for `hotel`
pub fn review_body(hotel: &str) -> Map<String, Value> {
    let value = json!({
        "hotel_name": hotel,
        "review_content": format!("Stayed at {}", hotel),
        "review_author": "Ozella Sipes",
        "review_date": "2013-05-20 13:38:15 +0300",
        "review_ratings": {"Overall": 4, "Cleanliness": 5}
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// k-NN hit for `hotel` at `distance`
pub fn vector_hit(hotel: &str, distance: f64) -> RawHit {
    RawHit::Vector {
        id: Some(format!("review_{}", hotel)),
        fields: review_body(hotel),
        distance: Some(distance),
    }
}

/// Distance query row for `hotel` at `distance`
pub fn distance_row(hotel: &str, distance: f64) -> Value {
    let mut row = review_body(hotel);
    row.insert("doc_id".into(), json!(format!("review_{}", hotel)));
    row.insert("distance_score".into(), json!(distance));
    Value::Object(row)
}

/// Embedding provider with deterministic output
pub struct FakeProvider {
    pub dim: usize,
    pub fail: bool,
    /// Batches shorter than requested, to exercise mismatch handling
    pub short_batches: bool,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            dim: EMBEDDING_DIM,
            fail: false,
            short_batches: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_dim(dim: usize) -> Self {
        Self { dim, ..Self::new() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let seed = text.bytes().fold(7u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        (0..self.dim)
            .map(|i| ((seed.wrapping_add(i as u32) % 1000) as f32) / 1000.0)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for FakeProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SearchError::Embedding("model unavailable".into()));
        }
        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.vector_for(t)).collect();
        if self.short_batches {
            vectors.pop();
        }
        Ok(vectors)
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        Ok(ProviderStatus::healthy(EmbeddingProviderType::Local, "cpu"))
    }

    async fn warmup(&self) -> Result<()> {
        Ok(())
    }

    fn embedding_dim(&self) -> usize {
        self.dim
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Local
    }
}
