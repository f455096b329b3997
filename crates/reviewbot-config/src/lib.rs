//! reviewbot Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.reviewbot/config.toml`
//! - Local config: `.reviewbot/config.toml` (in the working directory)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.
//! Secrets are never stored in the file; `*_env` settings name the
//! environment variable that holds them.

mod error;
mod loader;

pub use error::{ConfigError, FileOp};
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of results per question
pub const DEFAULT_TOP_K: usize = 5;

/// Root configuration for reviewbot.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ReviewbotConfig {
    /// Document store connection
    pub store: StoreConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Tiered retrieval tuning
    pub retrieval: RetrievalSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Which document store backs the review index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Couchbase cluster over its REST services (default)
    #[default]
    Couchbase,
    /// Qdrant vector database
    Qdrant,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Couchbase => write!(f, "couchbase"),
            Self::Qdrant => write!(f, "qdrant"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "couchbase" | "capella" => Ok(Self::Couchbase),
            "qdrant" => Ok(Self::Qdrant),
            _ => Err(ConfigError::Invalid(format!(
                "Unknown store backend: '{}'. Valid values: couchbase, qdrant",
                s
            ))),
        }
    }
}

/// Document store configuration.
///
/// # Example TOML
///
/// ```toml
/// [store]
/// backend = "couchbase"
///
/// [store.couchbase]
/// host = "cb.example.cloud.couchbase.com"
/// tls = true
/// username = "Administrator"
/// password_env = "REVIEWBOT_COUCHBASE_PASSWORD"
/// ca_cert = "/etc/reviewbot/capella.pem"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub couchbase: CouchbaseSettings,
    pub qdrant: QdrantSettings,
}

impl StoreConfig {
    /// Validate the section of the selected backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            StoreBackend::Couchbase => self.couchbase.validate(),
            StoreBackend::Qdrant => self.qdrant.validate(),
        }
    }
}

/// Couchbase connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CouchbaseSettings {
    /// Cluster host name
    pub host: String,

    /// Use the TLS service ports
    pub tls: bool,

    /// `couchbase://` or `couchbases://` URI; wins over `host` and `tls`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,

    pub username: String,

    /// Environment variable name containing the password
    pub password_env: String,

    /// PEM certificate to trust for TLS connections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    pub bucket: String,
    pub scope: String,

    /// Collection holding review vector documents
    pub collection: String,

    /// Collection holding source hotel documents (ingestion)
    pub source_collection: String,

    /// Name of the vector search index
    pub index_name: String,

    /// Document field holding the embedding
    pub vector_field: String,

    /// Management service port override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_port: Option<u16>,

    /// Query service port override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_port: Option<u16>,

    /// Search service port override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_port: Option<u16>,

    /// Key-value (document fetch and write) timeout in seconds
    pub kv_timeout_secs: u64,

    /// Query and search service timeout in seconds
    pub query_timeout_secs: u64,
}

impl Default for CouchbaseSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            tls: false,
            connection_string: None,
            username: "Administrator".to_string(),
            password_env: "REVIEWBOT_COUCHBASE_PASSWORD".to_string(),
            ca_cert: None,
            bucket: "travel-sample".to_string(),
            scope: "inventory".to_string(),
            collection: "reviewvector".to_string(),
            source_collection: "hotel".to_string(),
            index_name: "review_vector_idx".to_string(),
            vector_field: "embedding".to_string(),
            management_port: None,
            query_port: None,
            search_port: None,
            kv_timeout_secs: 30,
            query_timeout_secs: 75,
        }
    }
}

impl CouchbaseSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("store.couchbase.bucket", &self.bucket),
            ("store.couchbase.scope", &self.scope),
            ("store.couchbase.collection", &self.collection),
            ("store.couchbase.index_name", &self.index_name),
            ("store.couchbase.vector_field", &self.vector_field),
            ("store.couchbase.username", &self.username),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid_value(key, "must not be empty"));
            }
        }
        if self.host.trim().is_empty() && self.connection_string.is_none() {
            return Err(ConfigError::invalid_value(
                "store.couchbase.host",
                "set host or connection_string",
            ));
        }
        if let Some(conn) = &self.connection_string {
            if !(conn.starts_with("couchbase://") || conn.starts_with("couchbases://")) {
                return Err(ConfigError::invalid_value(
                    "store.couchbase.connection_string",
                    format!("'{}' is not a couchbase:// or couchbases:// URI", conn),
                ));
            }
        }
        if self.kv_timeout_secs == 0 || self.query_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "store.couchbase",
                "timeouts must be positive",
            ));
        }
        Ok(())
    }

    /// Password read from the environment variable named by `password_env`.
    pub fn password(&self) -> Result<String, ConfigError> {
        read_secret("store.couchbase.password_env", &self.password_env)
    }
}

/// Qdrant connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QdrantSettings {
    /// Qdrant gRPC URL
    pub url: String,

    /// Environment variable name containing the API key (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Collection holding review points
    pub collection: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for QdrantSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key_env: None,
            collection: "hotel_reviews".to_string(),
            timeout_secs: 30,
        }
    }
}

impl QdrantSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::invalid_value("store.qdrant.url", "must not be empty"));
        }
        if self.collection.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "store.qdrant.collection",
                "must not be empty",
            ));
        }
        Ok(())
    }

    /// API key from the environment, if one is configured.
    pub fn api_key(&self) -> Result<Option<String>, ConfigError> {
        self.api_key_env
            .as_deref()
            .map(|name| read_secret("store.qdrant.api_key_env", name))
            .transpose()
    }
}

/// Embedding provider configuration.
///
/// # Example TOML
///
/// ```toml
/// [embedding]
/// provider = "openai"
///
/// [embedding.openai]
/// url = "http://localhost:11434/v1"
/// model = "all-minilm"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which embedding provider to use
    pub provider: EmbeddingProviderType,

    /// Local Candle provider settings
    pub local: LocalSettings,

    /// OpenAI-compatible provider settings (required when provider = "openai")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<OpenAISettings>,
}

impl EmbeddingConfig {
    /// Validate that required settings exist for the selected provider.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider {
            EmbeddingProviderType::Local => {
                if self.local.model.trim().is_empty() {
                    return Err(ConfigError::invalid_value(
                        "embedding.local.model",
                        "must not be empty",
                    ));
                }
                Ok(())
            }
            EmbeddingProviderType::Openai => {
                let Some(settings) = self.openai.as_ref() else {
                    return Err(ConfigError::Invalid(
                        "embedding.provider is 'openai' but [embedding.openai] section is missing"
                            .to_string(),
                    ));
                };
                if settings.url.is_empty() {
                    return Err(ConfigError::Invalid(
                        "embedding.openai.url is required".to_string(),
                    ));
                }
                if settings.model.is_empty() {
                    return Err(ConfigError::Invalid(
                        "embedding.openai.model is required".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Embedding provider type selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderType {
    /// Local provider using Candle with all-MiniLM-L6-v2 (default)
    #[default]
    Local,
    /// OpenAI-compatible API (OpenAI, Azure OpenAI, Ollama, etc.)
    Openai,
}

impl std::fmt::Display for EmbeddingProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Openai => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for EmbeddingProviderType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "openai" => Ok(Self::Openai),
            _ => Err(ConfigError::Invalid(format!(
                "Unknown embedding provider: '{}'. Valid values: local, openai",
                s
            ))),
        }
    }
}

/// Local provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocalSettings {
    /// HuggingFace model id
    pub model: String,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
        }
    }
}

/// OpenAI-compatible provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAISettings {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub url: String,

    /// Environment variable name containing API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Embedding model
    pub model: String,

    /// Requested output dimension, for models that can shorten vectors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retry attempts
    pub max_retries: u32,

    /// Use Azure OpenAI authentication (api-key header)
    pub azure_mode: bool,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            model: "text-embedding-3-small".to_string(),
            dimensions: Some(384),
            timeout_secs: 30,
            max_retries: 3,
            azure_mode: false,
        }
    }
}

impl OpenAISettings {
    /// API key from the environment; `None` when no variable is configured
    /// or it is unset (local servers such as Ollama need none).
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty())
    }
}

/// Tiered retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Results per question
    pub top_k: usize,

    /// Vector search candidates examined per requested result
    pub candidate_multiplier: usize,

    /// Bound on each tier's store call, in seconds
    pub tier_timeout_secs: u64,

    /// Bound on each document fetch, in seconds
    pub fetch_timeout_secs: u64,

    /// Re-probe the vector index after a failure that suggests it changed
    pub reprobe_on_failure: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            candidate_multiplier: 20,
            tier_timeout_secs: 75,
            fetch_timeout_secs: 30,
            reprobe_on_failure: true,
        }
    }
}

impl RetrievalSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::invalid_value(
                "retrieval.top_k",
                "must be at least 1",
            ));
        }
        if self.candidate_multiplier == 0 {
            return Err(ConfigError::invalid_value(
                "retrieval.candidate_multiplier",
                "must be at least 1",
            ));
        }
        if self.tier_timeout_secs == 0 || self.fetch_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "retrieval",
                "timeouts must be positive",
            ));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override store backend
    pub backend: Option<StoreBackend>,

    /// Override Couchbase connection string
    pub connection_string: Option<String>,

    /// Override Couchbase username
    pub username: Option<String>,

    /// Override Qdrant URL
    pub qdrant_url: Option<String>,

    /// Override embedding provider type
    pub embedding_provider: Option<EmbeddingProviderType>,

    /// Override result count
    pub top_k: Option<usize>,

    /// Override log level
    pub log_level: Option<String>,
}

impl ReviewbotConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(backend) = overrides.backend {
            self.store.backend = backend;
        }

        if let Some(ref conn) = overrides.connection_string {
            self.store.couchbase.connection_string = Some(conn.clone());
        }

        if let Some(ref username) = overrides.username {
            self.store.couchbase.username = username.clone();
        }

        if let Some(ref url) = overrides.qdrant_url {
            self.store.qdrant.url = url.clone();
        }

        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }

        if let Some(top_k) = overrides.top_k {
            self.retrieval.top_k = top_k;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    ///
    /// Checks the selected backend and provider sections and retrieval bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.embedding.validate()?;
        self.retrieval.validate()?;
        Ok(())
    }
}

fn read_secret(key: &str, name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::missing_secret(key, name)),
    }
}
