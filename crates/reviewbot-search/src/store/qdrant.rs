//! Qdrant store
//!
//! The configured collection plays the role of the vector index. Qdrant has
//! no declarative query language, so only the key-listing and index-lookup
//! declarative queries are supported; the rest report an interface mismatch.
//!
//! Review keys are not valid Qdrant point ids, so each key is mapped to a
//! UUID derived from its SHA-256 and stored in the payload as `doc_id`.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, vectors_config::Config, GetPointsBuilder, PointId,
    PointStruct, Query, QueryPointsBuilder, ScoredPoint, ScrollPointsBuilder,
    SearchParamsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{DeclarativeQuery, DocumentStore, IndexDescriptor, VectorSearchRequest, VectorShape};
use crate::error::{Result, SearchError};
use crate::schema::{fields, RawHit, ReviewDocument};

/// Configuration for connecting to Qdrant
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Qdrant gRPC URL (e.g., "http://localhost:6334")
    pub url: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Collection holding review vectors
    pub collection: String,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            timeout_secs: 30,
            collection: "hotel_reviews".to_string(),
        }
    }
}

impl QdrantConfig {
    /// Create config with custom URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set collection name
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = name.into();
        self
    }
}

/// Map a Qdrant client error message onto the retrieval error taxonomy.
pub fn classify_error(msg: &str) -> SearchError {
    let lower = msg.to_ascii_lowercase();

    if lower.contains("unimplemented") || lower.contains("unknown method") {
        SearchError::InterfaceMismatch(msg.to_string())
    } else if (lower.contains("not found") && lower.contains("collection"))
        || lower.contains("doesn't exist")
    {
        SearchError::IndexNotFound(msg.to_string())
    } else if lower.contains("unavailable")
        || lower.contains("deadline")
        || lower.contains("transport")
        || lower.contains("connect")
        || lower.contains("unauthenticated")
        || lower.contains("permission denied")
    {
        SearchError::Connectivity(msg.to_string())
    } else {
        SearchError::Data(msg.to_string())
    }
}

/// Point id for a review key.
///
/// Numeric keys and UUIDs are used as-is; anything else is hashed into a
/// UUID-shaped string.
pub fn point_id_for(key: &str) -> PointId {
    if let Ok(n) = key.parse::<u64>() {
        return PointId::from(n);
    }
    if looks_like_uuid(key) {
        return PointId::from(key.to_string());
    }
    let digest = Sha256::digest(key.as_bytes());
    let hex = format!("{:x}", digest);
    PointId::from(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}

fn looks_like_uuid(key: &str) -> bool {
    let parts: Vec<&str> = key.split('-').collect();
    parts.len() == 5
        && parts
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(p, len)| p.len() == len && p.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Scroll limits are `u32`; larger requests saturate instead of wrapping.
fn scroll_limit(limit: usize) -> u32 {
    u32::try_from(limit).unwrap_or(u32::MAX)
}

fn point_id_string(id: Option<PointId>) -> Option<String> {
    match id?.point_id_options? {
        PointIdOptions::Num(n) => Some(n.to_string()),
        PointIdOptions::Uuid(u) => Some(u),
    }
}

/// Convert a Qdrant payload value into JSON
fn to_json(value: QdrantValue) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => json!(i),
        Some(Kind::DoubleValue(d)) => json!(d),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(list.values.into_iter().map(to_json).collect()),
        Some(Kind::StructValue(st)) => Value::Object(
            st.fields
                .into_iter()
                .map(|(k, v)| (k, to_json(v)))
                .collect(),
        ),
    }
}

fn payload_to_map(payload: HashMap<String, QdrantValue>) -> Map<String, Value> {
    payload.into_iter().map(|(k, v)| (k, to_json(v))).collect()
}

/// Key of a point: the stored `doc_id`, falling back to the point id
fn key_of(payload: &Map<String, Value>, id: Option<PointId>) -> Option<String> {
    payload
        .get(fields::DOC_ID)
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| point_id_string(id))
}

fn scored_to_hit(point: ScoredPoint) -> RawHit {
    let fields = payload_to_map(point.payload);
    let id = key_of(&fields, point.id);
    RawHit::Vector {
        id,
        fields,
        // Cosine collections report similarity; retrieval expects distance.
        distance: Some(1.0 - f64::from(point.score)),
    }
}

/// Qdrant document store
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl QdrantStore {
    /// Build a client. Connectivity is checked lazily by the first call.
    pub fn new(config: QdrantConfig) -> Result<Self> {
        info!(
            "Qdrant store at {} (collection '{}')",
            config.url, config.collection
        );

        let mut builder = Qdrant::from_url(&config.url)
            .timeout(std::time::Duration::from_secs(config.timeout_secs));

        if let Some(api_key) = config.api_key {
            builder = builder.api_key(api_key);
        }

        let client = builder.build().map_err(|e| {
            SearchError::InvalidConfig(format!("Failed to build Qdrant client: {}", e))
        })?;

        Ok(Self {
            client,
            collection: config.collection,
        })
    }

    async fn collection_dims(&self, name: &str) -> Result<Option<usize>> {
        let info = self.client.collection_info(name).await?;
        let dims = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                Config::Params(params) => Some(params.size as usize),
                Config::ParamsMap(map) => map.map.values().next().map(|p| p.size as usize),
            });
        Ok(dims)
    }
}

#[async_trait]
impl DocumentStore for QdrantStore {
    fn backend_name(&self) -> &'static str {
        "qdrant"
    }

    fn index_name(&self) -> &str {
        &self.collection
    }

    async fn vector_search(
        &self,
        request: &VectorSearchRequest,
        shape: VectorShape,
    ) -> Result<Vec<RawHit>> {
        let params = SearchParamsBuilder::default().hnsw_ef(request.candidates as u64);

        let points = match shape {
            VectorShape::Primary => {
                debug!("Query API search on '{}'", request.index);
                self.client
                    .query(
                        QueryPointsBuilder::new(&request.index)
                            .query(Query::new_nearest(request.vector.to_vec()))
                            .limit(request.limit as u64)
                            .with_payload(true)
                            .params(params),
                    )
                    .await?
                    .result
            }
            VectorShape::Alternate => {
                debug!("legacy search_points on '{}'", request.index);
                self.client
                    .search_points(
                        SearchPointsBuilder::new(
                            &request.index,
                            request.vector.to_vec(),
                            request.limit as u64,
                        )
                        .with_payload(true)
                        .params(params),
                    )
                    .await?
                    .result
            }
        };

        Ok(points.into_iter().map(scored_to_hit).collect())
    }

    async fn query(&self, query: &DeclarativeQuery) -> Result<Vec<Value>> {
        match query {
            DeclarativeQuery::ListKeys { limit } => {
                let response = self
                    .client
                    .scroll(
                        ScrollPointsBuilder::new(&self.collection)
                            .limit(scroll_limit(*limit))
                            .with_payload(true),
                    )
                    .await?;

                Ok(response
                    .result
                    .into_iter()
                    .filter_map(|point| {
                        let payload = payload_to_map(point.payload);
                        key_of(&payload, point.id)
                    })
                    .map(|key| json!({ fields::DOC_ID: key }))
                    .collect())
            }
            DeclarativeQuery::IndexLookup { index } => {
                if self.client.collection_exists(index.as_str()).await? {
                    Ok(vec![json!({ "name": index })])
                } else {
                    Ok(vec![])
                }
            }
            other => Err(SearchError::InterfaceMismatch(format!(
                "qdrant has no declarative {} query",
                other.kind()
            ))),
        }
    }

    async fn get_by_key(&self, id: &str) -> Result<Option<Map<String, Value>>> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, vec![point_id_for(id)]).with_payload(true),
            )
            .await?;

        Ok(response
            .result
            .into_iter()
            .next()
            .map(|point| payload_to_map(point.payload)))
    }

    async fn list_indexes(&self) -> Result<Vec<IndexDescriptor>> {
        let response = self.client.list_collections().await?;
        let mut indexes = Vec::with_capacity(response.collections.len());

        for collection in response.collections {
            let vector_dims = if collection.name == self.collection {
                self.collection_dims(&collection.name).await?
            } else {
                None
            };
            indexes.push(IndexDescriptor {
                name: collection.name,
                kind: "collection".to_string(),
                vector_dims,
            });
        }

        Ok(indexes)
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .health_check()
            .await
            .map_err(|e| SearchError::Connectivity(format!("Qdrant health check failed: {}", e)))?;
        Ok(())
    }

    async fn upsert(&self, id: &str, document: &ReviewDocument) -> Result<()> {
        let payload = Payload::try_from(json!({
            fields::DOC_ID: id,
            fields::HOTEL_ID: document.hotel_id,
            fields::HOTEL_NAME: document.hotel_name,
            fields::REVIEW_AUTHOR: document.review_author,
            fields::REVIEW_DATE: document.review_date,
            fields::REVIEW_CONTENT: document.review_content,
            fields::REVIEW_RATINGS: document.review_ratings,
        }))?;

        let point = PointStruct::new(point_id_for(id), document.embedding.clone(), payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await?;

        Ok(())
    }
}
