//! CLI command implementations
//!
//! Shared plumbing turns the merged configuration into a store, an
//! embedding provider and a searcher.

pub mod chat;
pub mod config;
pub mod ingest;
pub mod search;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reviewbot_config::{ConfigLoader, CouchbaseSettings, ReviewbotConfig, StoreBackend};
use reviewbot_search::embeddings::{EmbeddingConfig as SearchEmbeddingConfig, OpenAIConfig};
use reviewbot_search::store::ServiceEndpoints;
use reviewbot_search::{
    create_provider, CouchbaseConfig, CouchbaseStore, DocumentStore, EmbeddingProvider,
    EmbeddingProviderType, QdrantConfig, QdrantStore, RetrievalConfig, ReviewSearcher,
};
use tracing::info;

use crate::GlobalOptions;

/// Directory whose `.reviewbot/config.toml` is the local config.
pub fn config_root() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to get current directory")
}

/// Load configuration: global → local (or `--config` file) → CLI overrides.
pub fn load_config(global: &GlobalOptions) -> Result<ReviewbotConfig> {
    let mut loader = ConfigLoader::new();
    let overrides = global.to_config_overrides();

    if let Some(ref path) = global.config {
        return loader
            .load_file(path, Some(&overrides))
            .with_context(|| format!("Failed to load config file {}", path.display()));
    }

    let root = config_root()?;
    loader
        .load(&root, Some(&overrides))
        .context("Failed to load configuration")
}

/// Load configuration and reject it unless it validates.
pub fn load_valid_config(global: &GlobalOptions) -> Result<ReviewbotConfig> {
    let config = load_config(global)?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Translate Couchbase settings into the store's connection config.
pub fn couchbase_config(settings: &CouchbaseSettings) -> Result<CouchbaseConfig> {
    let base = match settings.connection_string {
        Some(ref conn) => CouchbaseConfig::from_connection_string(conn)?,
        None => CouchbaseConfig {
            host: settings.host.clone(),
            tls: settings.tls,
            ..Default::default()
        },
    };

    let mut config = base.credentials(settings.username.clone(), settings.password()?);
    config.ca_cert_path = settings.ca_cert.clone();
    config.bucket = settings.bucket.clone();
    config.scope = settings.scope.clone();
    config.collection = settings.collection.clone();
    config.source_collection = settings.source_collection.clone();
    config.index_name = settings.index_name.clone();
    config.kv_timeout = Duration::from_secs(settings.kv_timeout_secs);
    config.query_timeout = Duration::from_secs(settings.query_timeout_secs);

    if settings.management_port.is_some()
        || settings.query_port.is_some()
        || settings.search_port.is_some()
    {
        let defaults = config.service_endpoints();
        let scheme = if config.tls { "https" } else { "http" };
        let at = |port: Option<u16>, default: String| {
            port.map(|p| format!("{}://{}:{}", scheme, config.host, p))
                .unwrap_or(default)
        };
        config.endpoints = Some(ServiceEndpoints {
            management: at(settings.management_port, defaults.management),
            query: at(settings.query_port, defaults.query),
            search: at(settings.search_port, defaults.search),
        });
    }

    Ok(config)
}

/// Connect to the configured document store.
pub fn create_store(config: &ReviewbotConfig) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.store.backend {
        StoreBackend::Couchbase => {
            let cb = couchbase_config(&config.store.couchbase)?;
            info!(
                "Using Couchbase at {} ({}.{}.{})",
                cb.host, cb.bucket, cb.scope, cb.collection
            );
            Arc::new(CouchbaseStore::new(cb).context("Failed to create Couchbase client")?)
        }
        StoreBackend::Qdrant => {
            let settings = &config.store.qdrant;
            let mut qdrant = QdrantConfig::with_url(&settings.url).collection(&settings.collection);
            qdrant.timeout_secs = settings.timeout_secs;
            if let Some(key) = settings.api_key()? {
                qdrant = qdrant.api_key(key);
            }
            info!("Using Qdrant at {} ({})", settings.url, settings.collection);
            Arc::new(QdrantStore::new(qdrant).context("Failed to create Qdrant client")?)
        }
    };
    Ok(store)
}

/// Convert reviewbot_config's embedding settings to reviewbot_search's EmbeddingConfig.
pub fn to_search_embedding_config(config: &ReviewbotConfig) -> SearchEmbeddingConfig {
    match config.embedding.provider {
        reviewbot_config::EmbeddingProviderType::Local => SearchEmbeddingConfig {
            provider: EmbeddingProviderType::Local,
            local_model: Some(config.embedding.local.model.clone()),
            openai: None,
        },
        reviewbot_config::EmbeddingProviderType::Openai => match config.embedding.openai {
            Some(ref openai) => SearchEmbeddingConfig::openai_with_config(OpenAIConfig {
                base_url: openai.url.clone(),
                api_key: openai.api_key(),
                model: openai.model.clone(),
                dimensions: openai.dimensions,
                timeout_secs: openai.timeout_secs,
                max_retries: openai.max_retries,
                azure_mode: openai.azure_mode,
            }),
            // No settings provided, let factory read from environment
            None => SearchEmbeddingConfig::openai(),
        },
    }
}

pub fn create_embedding_provider(config: &ReviewbotConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    create_provider(&to_search_embedding_config(config))
        .context("Failed to create embedding provider")
}

/// Retrieval tuning from the `[retrieval]` section.
pub fn retrieval_config(config: &ReviewbotConfig) -> RetrievalConfig {
    RetrievalConfig {
        candidate_multiplier: config.retrieval.candidate_multiplier,
        tier_timeout: Duration::from_secs(config.retrieval.tier_timeout_secs),
        fetch_timeout: Duration::from_secs(config.retrieval.fetch_timeout_secs),
        vector_field: config.store.couchbase.vector_field.clone(),
        ..Default::default()
    }
}

/// Build a searcher for one session.
pub fn create_searcher(config: &ReviewbotConfig) -> Result<ReviewSearcher> {
    let provider = create_embedding_provider(config)?;
    let store = create_store(config)?;
    Ok(ReviewSearcher::new(provider, store, retrieval_config(config))
        .with_reprobe_on_failure(config.retrieval.reprobe_on_failure))
}
