//! Couchbase store over the cluster's REST services
//!
//! | Capability      | Service    | Endpoint                                                         |
//! |-----------------|------------|------------------------------------------------------------------|
//! | k-NN (primary)  | Search     | POST `/api/bucket/{b}/scope/{s}/index/{idx}/query`               |
//! | k-NN (alternate)| Search     | POST `/api/index/{b}.{s}.{idx}/query`                            |
//! | index listing   | Search     | GET `/api/bucket/{b}/scope/{s}/index`                            |
//! | SQL++           | Query      | POST `/query/service`                                            |
//! | key lookup      | Management | GET `/pools/default/buckets/{b}/scopes/{s}/collections/{c}/docs/{id}` |
//!
//! Search hit `score` values are read as distances (lower is closer).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, trace};

use super::sqlpp::{self, Statement};
use super::{
    DeclarativeQuery, DocumentStore, IndexDescriptor, Keyspace, VectorSearchRequest, VectorShape,
};
use crate::error::{Result, SearchError};
use crate::schema::{RawHit, ReviewDocument};

/// Default key-value (document) timeout
pub const DEFAULT_KV_TIMEOUT: Duration = Duration::from_secs(30);

/// Default query and search timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(75);

/// Configuration for connecting to a Couchbase cluster
#[derive(Clone)]
pub struct CouchbaseConfig {
    /// Cluster host name (no scheme, no port)
    pub host: String,
    /// Use the TLS ports (18091/18093/18094)
    pub tls: bool,
    pub username: String,
    pub password: String,
    /// PEM bundle trusted in addition to the system roots
    pub ca_cert_path: Option<PathBuf>,
    pub bucket: String,
    pub scope: String,
    /// Collection holding review vector documents
    pub collection: String,
    /// Collection holding source hotel documents
    pub source_collection: String,
    /// Search index over `collection`
    pub index_name: String,
    pub kv_timeout: Duration,
    pub query_timeout: Duration,
    /// Per-service base URL overrides (management, query, search)
    pub endpoints: Option<ServiceEndpoints>,
}

impl Default for CouchbaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            tls: false,
            username: "Administrator".into(),
            password: String::new(),
            ca_cert_path: None,
            bucket: "travel-sample".into(),
            scope: "inventory".into(),
            collection: "reviewvector".into(),
            source_collection: "hotel".into(),
            index_name: "review_vector_idx".into(),
            kv_timeout: DEFAULT_KV_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            endpoints: None,
        }
    }
}

impl std::fmt::Debug for CouchbaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouchbaseConfig")
            .field("host", &self.host)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("scope", &self.scope)
            .field("collection", &self.collection)
            .field("index_name", &self.index_name)
            .finish()
    }
}

impl CouchbaseConfig {
    /// Build a config from a `couchbase://` or `couchbases://` connection string.
    ///
    /// Only the first host is used; connection-string options are ignored.
    pub fn from_connection_string(conn: &str) -> Result<Self> {
        let (tls, rest) = if let Some(rest) = conn.strip_prefix("couchbases://") {
            (true, rest)
        } else if let Some(rest) = conn.strip_prefix("couchbase://") {
            (false, rest)
        } else if conn.contains("://") {
            return Err(SearchError::InvalidConfig(format!(
                "unsupported connection string scheme: {}",
                conn
            )));
        } else {
            (false, conn)
        };

        let host = rest
            .split(['?', '/'])
            .next()
            .and_then(|hosts| hosts.split(',').next())
            .map(|h| h.split(':').next().unwrap_or(h))
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                SearchError::InvalidConfig(format!("no host in connection string: {}", conn))
            })?;

        Ok(Self {
            host: host.to_string(),
            tls,
            ..Default::default()
        })
    }

    /// Set credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Point every service at a single base URL (used against proxies and mocks)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.endpoints = Some(ServiceEndpoints {
            management: url.clone(),
            query: url.clone(),
            search: url,
        });
        self
    }

    /// Review collection keyspace
    pub fn keyspace(&self) -> Keyspace {
        Keyspace::new(&self.bucket, &self.scope, &self.collection)
    }

    /// Resolved service base URLs
    pub fn service_endpoints(&self) -> ServiceEndpoints {
        if let Some(endpoints) = &self.endpoints {
            return endpoints.clone();
        }
        let (scheme, mgmt, query, search) = if self.tls {
            ("https", 18091, 18093, 18094)
        } else {
            ("http", 8091, 8093, 8094)
        };
        ServiceEndpoints {
            management: format!("{}://{}:{}", scheme, self.host, mgmt),
            query: format!("{}://{}:{}", scheme, self.host, query),
            search: format!("{}://{}:{}", scheme, self.host, search),
        }
    }
}

/// Base URLs of the cluster services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub management: String,
    pub query: String,
    pub search: String,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct KnnClause<'a> {
    field: &'a str,
    vector: &'a [f32],
    k: usize,
}

#[derive(Debug, Serialize)]
struct KnnSearchBody<'a> {
    query: Value,
    knn: [KnnClause<'a>; 1],
    size: usize,
    fields: &'a [String],
}

#[derive(Debug, Deserialize)]
struct SearchHitWire {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    fields: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponseWire {
    #[serde(default)]
    hits: Option<Vec<SearchHitWire>>,
}

#[derive(Debug, Deserialize)]
struct QueryErrorWire {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponseWire {
    #[serde(default)]
    results: Option<Vec<Value>>,
    #[serde(default)]
    errors: Option<Vec<QueryErrorWire>>,
}

#[derive(Debug, Deserialize)]
struct IndexListWire {
    #[serde(default, rename = "indexDefs")]
    index_defs: Option<IndexDefsWire>,
}

#[derive(Debug, Deserialize)]
struct IndexDefsWire {
    #[serde(default, rename = "indexDefs")]
    index_defs: Option<Map<String, Value>>,
}

// ============================================================================
// Error classification
// ============================================================================

/// Classify a non-success HTTP response from the search or management service.
fn classify_status(status: StatusCode, body: &str, what: &str) -> SearchError {
    let lower = body.to_ascii_lowercase();
    if lower.contains("index not found") || lower.contains("index_not_found") {
        return SearchError::IndexNotFound(format!("{}: {}", what, body.trim()));
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SearchError::Connectivity(format!("{}: authentication rejected ({})", what, status))
        }
        StatusCode::NOT_FOUND
        | StatusCode::METHOD_NOT_ALLOWED
        | StatusCode::NOT_IMPLEMENTED
        | StatusCode::BAD_REQUEST => {
            SearchError::InterfaceMismatch(format!("{}: {} {}", what, status, body.trim()))
        }
        s if s.is_server_error() => {
            SearchError::Connectivity(format!("{}: server error {}", what, status))
        }
        _ => SearchError::Data(format!("{}: unexpected status {}", what, status)),
    }
}

/// Classify SQL++ error entries by code.
///
/// 3xxx are parse and semantic errors (unknown function, bad syntax); the
/// statement shape is what the server rejects.
fn classify_query_errors(errors: &[QueryErrorWire], timeout: Duration) -> SearchError {
    let summary = errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.msg))
        .collect::<Vec<_>>()
        .join("; ");

    let first = errors.first().map(|e| e.code).unwrap_or_default();
    match first {
        1080 => SearchError::Timeout(timeout),
        3000..=3999 => SearchError::InterfaceMismatch(summary),
        10000..=10999 | 13014 => SearchError::Connectivity(summary),
        12016 => SearchError::IndexNotFound(summary),
        _ => SearchError::Data(summary),
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration, what: &str) -> SearchError {
    if err.is_timeout() {
        SearchError::Timeout(timeout)
    } else if err.is_connect() {
        SearchError::Connectivity(format!("{}: connection failed: {}", what, err))
    } else {
        SearchError::Connectivity(format!("{}: request failed: {}", what, err))
    }
}

/// Find the first vector field mapping and return its dimension.
fn vector_dims(value: &Value) -> Option<usize> {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("vector") {
                if let Some(dims) = map.get("dims").and_then(Value::as_u64) {
                    return Some(dims as usize);
                }
            }
            map.values().find_map(vector_dims)
        }
        Value::Array(items) => items.iter().find_map(vector_dims),
        _ => None,
    }
}

// ============================================================================
// Store
// ============================================================================

/// Couchbase document store
pub struct CouchbaseStore {
    client: Client,
    config: CouchbaseConfig,
    endpoints: ServiceEndpoints,
    keyspace: Keyspace,
}

impl CouchbaseStore {
    /// Create a store client. No request is made until the first call.
    pub fn new(config: CouchbaseConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(config.query_timeout);

        if let Some(path) = &config.ca_cert_path {
            let pem = std::fs::read(path)?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                SearchError::InvalidConfig(format!(
                    "invalid CA certificate {}: {}",
                    path.display(),
                    e
                ))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| SearchError::InvalidConfig(format!("HTTP client error: {}", e)))?;

        let endpoints = config.service_endpoints();
        let keyspace = config.keyspace();
        info!(
            "Couchbase store for {} (search index '{}')",
            keyspace, config.index_name
        );

        Ok(Self {
            client,
            config,
            endpoints,
            keyspace,
        })
    }

    pub fn config(&self) -> &CouchbaseConfig {
        &self.config
    }

    /// Build `{base}/{segments...}` with each segment percent-encoded
    fn url(&self, base: &str, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(base)
            .map_err(|e| SearchError::InvalidConfig(format!("invalid URL {}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| SearchError::InvalidConfig(format!("URL cannot be a base: {}", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn document_url(&self, id: &str) -> Result<Url> {
        self.url(
            &self.endpoints.management,
            &[
                "pools",
                "default",
                "buckets",
                &self.keyspace.bucket,
                "scopes",
                &self.keyspace.scope,
                "collections",
                &self.keyspace.collection,
                "docs",
                id,
            ],
        )
    }

    async fn send(&self, request: RequestBuilder, timeout: Duration, what: &str) -> Result<Response> {
        request
            .basic_auth(&self.config.username, Some(&self.config.password))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout, what))
    }

    async fn run_statement(&self, statement: Statement) -> Result<Vec<Value>> {
        let url = self.url(&self.endpoints.query, &["query", "service"])?;

        let mut body = statement.params;
        body.insert("statement".into(), Value::String(statement.text));
        body.insert(
            "query_context".into(),
            Value::String(sqlpp::query_context(&self.keyspace)?),
        );
        body.insert(
            "timeout".into(),
            Value::String(format!("{}ms", self.config.query_timeout.as_millis())),
        );

        let response = self
            .send(
                self.client.post(url).json(&body),
                self.config.query_timeout,
                "query service",
            )
            .await?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.config.query_timeout, "query service"))?;

        match serde_json::from_str::<QueryResponseWire>(&text) {
            Ok(parsed) => {
                if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
                    return Err(classify_query_errors(&errors, self.config.query_timeout));
                }
                if !status.is_success() {
                    return Err(classify_status(status, &text, "query service"));
                }
                Ok(parsed.results.unwrap_or_default())
            }
            Err(_) if !status.is_success() => Err(classify_status(status, &text, "query service")),
            Err(e) => Err(SearchError::Data(format!(
                "query service returned malformed JSON: {}",
                e
            ))),
        }
    }

    fn search_url(&self, request: &VectorSearchRequest, shape: VectorShape) -> Result<Url> {
        match shape {
            VectorShape::Primary => self.url(
                &self.endpoints.search,
                &[
                    "api",
                    "bucket",
                    &self.keyspace.bucket,
                    "scope",
                    &self.keyspace.scope,
                    "index",
                    &request.index,
                    "query",
                ],
            ),
            VectorShape::Alternate => {
                let qualified = format!(
                    "{}.{}.{}",
                    self.keyspace.bucket, self.keyspace.scope, request.index
                );
                self.url(&self.endpoints.search, &["api", "index", &qualified, "query"])
            }
        }
    }
}

#[async_trait]
impl DocumentStore for CouchbaseStore {
    fn backend_name(&self) -> &'static str {
        "couchbase"
    }

    fn index_name(&self) -> &str {
        &self.config.index_name
    }

    async fn vector_search(
        &self,
        request: &VectorSearchRequest,
        shape: VectorShape,
    ) -> Result<Vec<RawHit>> {
        let url = self.search_url(request, shape)?;
        debug!("k-NN search ({:?}) against {}", shape, url.path());

        let body = KnnSearchBody {
            query: serde_json::json!({ "match_none": {} }),
            knn: [KnnClause {
                field: &request.field,
                vector: request.vector.as_slice(),
                k: request.candidates.max(request.limit),
            }],
            size: request.limit,
            fields: &request.return_fields,
        };

        let response = self
            .send(
                self.client.post(url).json(&body),
                self.config.query_timeout,
                "search service",
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, "search service"));
        }

        let parsed: SearchResponseWire = response.json().await.map_err(|e| {
            SearchError::Data(format!("search service returned malformed JSON: {}", e))
        })?;

        let hits: Vec<RawHit> = parsed
            .hits
            .unwrap_or_default()
            .into_iter()
            .map(|hit| RawHit::Vector {
                id: hit.id,
                fields: hit.fields.unwrap_or_default(),
                distance: hit.score,
            })
            .collect();

        trace!("search service returned {} hits", hits.len());
        Ok(hits)
    }

    async fn query(&self, query: &DeclarativeQuery) -> Result<Vec<Value>> {
        let statement = sqlpp::render(query, &self.keyspace, &self.config.source_collection)?;
        debug!("SQL++ {} query", query.kind());
        self.run_statement(statement).await
    }

    async fn get_by_key(&self, id: &str) -> Result<Option<Map<String, Value>>> {
        let url = self.document_url(id)?;
        let response = self
            .send(self.client.get(url), self.config.kv_timeout, "document fetch")
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, "document fetch"));
        }

        let envelope: Value = response.json().await.map_err(|e| {
            SearchError::Data(format!("document {} is not valid JSON: {}", id, e))
        })?;

        // The REST API wraps the body as `{"meta": ..., "json": ...}`, and some
        // versions send `json` as an encoded string.
        let body = match envelope {
            Value::Object(mut map) if map.contains_key("json") => {
                match map.remove("json").unwrap_or(Value::Null) {
                    Value::String(encoded) => serde_json::from_str(&encoded).map_err(|e| {
                        SearchError::Data(format!("document {} body is not JSON: {}", id, e))
                    })?,
                    other => other,
                }
            }
            other => other,
        };

        match body {
            Value::Object(map) => Ok(Some(map)),
            other => Err(SearchError::Data(format!(
                "document {} is not an object: {}",
                id, other
            ))),
        }
    }

    async fn list_indexes(&self) -> Result<Vec<IndexDescriptor>> {
        let url = self.url(
            &self.endpoints.search,
            &[
                "api",
                "bucket",
                &self.keyspace.bucket,
                "scope",
                &self.keyspace.scope,
                "index",
            ],
        )?;

        let response = self
            .send(self.client.get(url), self.config.kv_timeout, "index listing")
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, "index listing"));
        }

        let parsed: IndexListWire = response.json().await.map_err(|e| {
            SearchError::Data(format!("index listing returned malformed JSON: {}", e))
        })?;

        let defs = parsed
            .index_defs
            .and_then(|d| d.index_defs)
            .unwrap_or_default();

        Ok(defs
            .into_iter()
            .map(|(key, def)| {
                let full_name = def
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(&key)
                    .to_string();
                // Scoped indexes are reported as `bucket.scope.name`
                let name = full_name
                    .rsplit('.')
                    .next()
                    .unwrap_or(&full_name)
                    .to_string();
                IndexDescriptor {
                    name,
                    kind: def
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or("fulltext-index")
                        .to_string(),
                    vector_dims: def.get("params").and_then(vector_dims),
                }
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        let url = self.url(&self.endpoints.management, &["pools"])?;
        let response = self
            .send(self.client.get(url), self.config.kv_timeout, "ping")
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SearchError::Connectivity(format!(
                "management service answered {}",
                status
            )))
        }
    }

    async fn upsert(&self, id: &str, document: &ReviewDocument) -> Result<()> {
        let url = self.document_url(id)?;
        let value = serde_json::to_string(document)?;
        let response = self
            .send(
                self.client.post(url).form(&[("value", value.as_str())]),
                self.config.kv_timeout,
                "document upsert",
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, "document upsert"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CouchbaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouchbaseStore")
            .field("keyspace", &self.keyspace.to_string())
            .field("index", &self.config.index_name)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::EmbeddingVector;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> CouchbaseStore {
        let config = CouchbaseConfig {
            kv_timeout: Duration::from_secs(2),
            query_timeout: Duration::from_secs(2),
            ..Default::default()
        }
        .credentials("Administrator", "password")
        .with_base_url(server.uri());
        CouchbaseStore::new(config).unwrap()
    }

    fn knn_request() -> VectorSearchRequest {
        VectorSearchRequest {
            index: "review_vector_idx".into(),
            field: "embedding".into(),
            vector: EmbeddingVector::new(vec![0.25; 4], 4).unwrap(),
            limit: 2,
            candidates: 40,
            return_fields: vec!["hotel_name".into(), "review_content".into()],
        }
    }

    #[test]
    fn test_connection_string_parsing() {
        let config = CouchbaseConfig::from_connection_string("couchbases://cb.example.com").unwrap();
        assert!(config.tls);
        assert_eq!(config.host, "cb.example.com");
        assert_eq!(
            config.service_endpoints().search,
            "https://cb.example.com:18094"
        );

        let plain =
            CouchbaseConfig::from_connection_string("couchbase://a.local,b.local?network=external")
                .unwrap();
        assert!(!plain.tls);
        assert_eq!(plain.host, "a.local");
        assert_eq!(plain.service_endpoints().query, "http://a.local:8093");

        assert!(CouchbaseConfig::from_connection_string("http://x").is_err());
        assert!(CouchbaseConfig::from_connection_string("couchbase://").is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = CouchbaseConfig::default().credentials("admin", "hunter2");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_vector_dims_found_in_nested_mapping() {
        let params = json!({
            "mapping": {
                "types": {
                    "inventory.reviewvector": {
                        "properties": {
                            "embedding": {
                                "fields": [{"name": "embedding", "type": "vector", "dims": 384}]
                            }
                        }
                    }
                }
            }
        });
        assert_eq!(vector_dims(&params), Some(384));
        assert_eq!(vector_dims(&json!({"mapping": {}})), None);
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "", "x"),
            SearchError::Connectivity(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "unknown field knn", "x"),
            SearchError::InterfaceMismatch(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "rest_auth: index not found", "x"),
            SearchError::IndexNotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, "", "x"),
            SearchError::Connectivity(_)
        ));
    }

    #[tokio::test]
    async fn test_knn_primary_shape() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(
                "/api/bucket/travel-sample/scope/inventory/index/review_vector_idx/query",
            ))
            .and(body_partial_json(json!({
                "size": 2,
                "knn": [{"field": "embedding", "k": 40}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": {"total": 1, "failed": 0, "successful": 1},
                "hits": [
                    {"id": "review_vector_a", "score": 0.1, "fields": {"hotel_name": "Medway"}},
                    {"id": "review_vector_b", "score": 0.3, "fields": {"hotel_name": "Glasgow"}}
                ],
                "total_hits": 2
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let hits = store
            .vector_search(&knn_request(), VectorShape::Primary)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        match &hits[0] {
            RawHit::Vector { id, fields, distance } => {
                assert_eq!(id.as_deref(), Some("review_vector_a"));
                assert_eq!(fields["hotel_name"], json!("Medway"));
                assert_eq!(*distance, Some(0.1));
            }
            other => panic!("unexpected hit {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_knn_alternate_shape_uses_qualified_index() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(
                "/api/index/travel-sample.inventory.review_vector_idx/query",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": null})))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let hits = store
            .vector_search(&knn_request(), VectorShape::Alternate)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_knn_rejected_shape_is_interface_mismatch() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("unknown field: knn"))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let err = store
            .vector_search(&knn_request(), VectorShape::Primary)
            .await
            .unwrap_err();
        assert!(err.is_interface_mismatch());
    }

    #[tokio::test]
    async fn test_query_service_rows_and_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query/service"))
            .and(body_partial_json(json!({"$limit": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "results": [{"doc_id": "k1"}, {"doc_id": "k2"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/query/service"))
            .and(body_partial_json(json!({"$limit": 5})))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": "fatal",
                "errors": [{"code": 3000, "msg": "syntax error - at VECTOR_DISTANCE"}]
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let rows = store
            .query(&DeclarativeQuery::ListKeys { limit: 3 })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        let err = store
            .query(&DeclarativeQuery::ListKeys { limit: 5 })
            .await
            .unwrap_err();
        assert!(err.is_interface_mismatch());
    }

    #[tokio::test]
    async fn test_get_by_key_envelope_and_missing() {
        let server = MockServer::start().await;
        let base = "/pools/default/buckets/travel-sample/scopes/inventory/collections/reviewvector/docs";

        Mock::given(method("GET"))
            .and(path(format!("{}/review_vector_a", base)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "meta": {"id": "review_vector_a"},
                "json": "{\"hotel_name\":\"Medway\"}"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/review_vector_b", base)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "meta": {"id": "review_vector_b"},
                "json": {"hotel_name": "Glasgow"}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/missing", base)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let a = store.get_by_key("review_vector_a").await.unwrap().unwrap();
        assert_eq!(a["hotel_name"], json!("Medway"));
        let b = store.get_by_key("review_vector_b").await.unwrap().unwrap();
        assert_eq!(b["hotel_name"], json!("Glasgow"));
        assert!(store.get_by_key("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_indexes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/bucket/travel-sample/scope/inventory/index"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "indexDefs": {
                    "indexDefs": {
                        "travel-sample.inventory.review_vector_idx": {
                            "type": "fulltext-index",
                            "name": "travel-sample.inventory.review_vector_idx",
                            "params": {"mapping": {"types": {"inventory.reviewvector": {
                                "properties": {"embedding": {"fields": [
                                    {"name": "embedding", "type": "vector", "dims": 384}
                                ]}}
                            }}}}
                        }
                    }
                }
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let indexes = store.list_indexes().await.unwrap();
        assert_eq!(
            indexes,
            vec![IndexDescriptor {
                name: "review_vector_idx".into(),
                kind: "fulltext-index".into(),
                vector_dims: Some(384),
            }]
        );
    }

    #[tokio::test]
    async fn test_unauthorized_is_connectivity() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(store.list_indexes().await.unwrap_err().is_connectivity());
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"hits": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = CouchbaseConfig {
            query_timeout: Duration::from_millis(50),
            ..Default::default()
        }
        .with_base_url(server.uri());
        let store = CouchbaseStore::new(config).unwrap();

        let err = store
            .vector_search(&knn_request(), VectorShape::Primary)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connectivity() {
        let config = CouchbaseConfig::default().with_base_url("http://127.0.0.1:9");
        let store = CouchbaseStore::new(config).unwrap();
        assert!(store.ping().await.unwrap_err().is_connectivity());
    }

    #[tokio::test]
    async fn test_upsert_posts_form_value() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(
                "/pools/default/buckets/travel-sample/scopes/inventory/collections/reviewvector/docs/review_vector_x",
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        let document = ReviewDocument {
            hotel_id: "hotel_1".into(),
            hotel_name: "Medway".into(),
            review_author: "Ozella".into(),
            review_date: "2013-06-22".into(),
            review_content: "Nice".into(),
            review_ratings: Default::default(),
            embedding: vec![0.0; 4],
        };
        store.upsert("review_vector_x", &document).await.unwrap();
    }
}
