//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.reviewbot/config.toml`
//! 2. Local config: `.reviewbot/config.toml` (in the working directory)
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{
    ConfigOverrides, CouchbaseSettings, EmbeddingConfig, EmbeddingProviderType, LoggingConfig,
    QdrantSettings, RetrievalSettings, ReviewbotConfig, StoreBackend, StoreConfig,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global and local configuration directory name.
const CONFIG_DIR: &str = ".reviewbot";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.reviewbot`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<ReviewbotConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.reviewbot`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path under `root`.
    pub fn local_config_path(&self, root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides. The result is
    /// not validated; call [`ReviewbotConfig::validate`].
    pub fn load(
        &mut self,
        root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<ReviewbotConfig, ConfigError> {
        let mut config = ReviewbotConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<ReviewbotConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;

        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration under `root`.
    pub fn load_local(&self, root: &Path) -> Result<Option<ReviewbotConfig>, ConfigError> {
        let local_path = self.local_config_path(root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Load an explicitly named config file, merged over the global config.
    pub fn load_file(
        &mut self,
        path: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<ReviewbotConfig, ConfigError> {
        let mut config = ReviewbotConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        debug!("Loading config from {:?}", path);
        config = merge_configs(config, load_config_file(path)?);

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        Ok(config)
    }

    /// Save configuration to the local config file under `root`.
    pub fn save_local(&self, root: &Path, config: &ReviewbotConfig) -> Result<(), ConfigError> {
        save_config_file(&self.local_config_path(root), config)
    }

    /// Create `~/.reviewbot/config.toml` with defaults unless it exists.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };
        init_in(global_dir)
    }

    /// Create `.reviewbot/config.toml` under `root` unless it exists.
    pub fn init_local(&self, root: &Path) -> Result<PathBuf, ConfigError> {
        init_in(&root.join(CONFIG_DIR))
    }

    /// Clear cached global configuration.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

fn init_in(dir: &Path) -> Result<PathBuf, ConfigError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::create_dir(dir, e))?;
    }

    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        save_config_file(&config_path, &ReviewbotConfig::default())?;
    }

    Ok(config_path)
}

/// Load a configuration file from disk.
fn load_config_file(path: &Path) -> Result<ReviewbotConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Save a configuration file to disk.
fn save_config_file(path: &Path, config: &ReviewbotConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Pick `overlay` when it differs from the default, otherwise keep `base`.
fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// A partial file deserializes with defaults for everything it leaves out,
/// so only values that differ from the default override `base`.
fn merge_configs(base: ReviewbotConfig, overlay: ReviewbotConfig) -> ReviewbotConfig {
    ReviewbotConfig {
        store: merge_store(base.store, overlay.store),
        embedding: merge_embedding(base.embedding, overlay.embedding),
        retrieval: merge_retrieval(base.retrieval, overlay.retrieval),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_store(base: StoreConfig, overlay: StoreConfig) -> StoreConfig {
    StoreConfig {
        backend: pick(base.backend, overlay.backend, StoreBackend::default()),
        couchbase: merge_couchbase(base.couchbase, overlay.couchbase),
        qdrant: merge_qdrant(base.qdrant, overlay.qdrant),
    }
}

fn merge_couchbase(base: CouchbaseSettings, overlay: CouchbaseSettings) -> CouchbaseSettings {
    let d = CouchbaseSettings::default();
    CouchbaseSettings {
        host: pick(base.host, overlay.host, d.host),
        tls: pick(base.tls, overlay.tls, d.tls),
        connection_string: overlay.connection_string.or(base.connection_string),
        username: pick(base.username, overlay.username, d.username),
        password_env: pick(base.password_env, overlay.password_env, d.password_env),
        ca_cert: overlay.ca_cert.or(base.ca_cert),
        bucket: pick(base.bucket, overlay.bucket, d.bucket),
        scope: pick(base.scope, overlay.scope, d.scope),
        collection: pick(base.collection, overlay.collection, d.collection),
        source_collection: pick(
            base.source_collection,
            overlay.source_collection,
            d.source_collection,
        ),
        index_name: pick(base.index_name, overlay.index_name, d.index_name),
        vector_field: pick(base.vector_field, overlay.vector_field, d.vector_field),
        management_port: overlay.management_port.or(base.management_port),
        query_port: overlay.query_port.or(base.query_port),
        search_port: overlay.search_port.or(base.search_port),
        kv_timeout_secs: pick(base.kv_timeout_secs, overlay.kv_timeout_secs, d.kv_timeout_secs),
        query_timeout_secs: pick(
            base.query_timeout_secs,
            overlay.query_timeout_secs,
            d.query_timeout_secs,
        ),
    }
}

fn merge_qdrant(base: QdrantSettings, overlay: QdrantSettings) -> QdrantSettings {
    let d = QdrantSettings::default();
    QdrantSettings {
        url: pick(base.url, overlay.url, d.url),
        api_key_env: overlay.api_key_env.or(base.api_key_env),
        collection: pick(base.collection, overlay.collection, d.collection),
        timeout_secs: pick(base.timeout_secs, overlay.timeout_secs, d.timeout_secs),
    }
}

fn merge_embedding(base: EmbeddingConfig, overlay: EmbeddingConfig) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: pick(base.provider, overlay.provider, EmbeddingProviderType::Local),
        local: pick(base.local, overlay.local, Default::default()),
        // Overlay openai takes precedence if set
        openai: overlay.openai.or(base.openai),
    }
}

fn merge_retrieval(base: RetrievalSettings, overlay: RetrievalSettings) -> RetrievalSettings {
    let d = RetrievalSettings::default();
    RetrievalSettings {
        top_k: pick(base.top_k, overlay.top_k, d.top_k),
        candidate_multiplier: pick(
            base.candidate_multiplier,
            overlay.candidate_multiplier,
            d.candidate_multiplier,
        ),
        tier_timeout_secs: pick(
            base.tier_timeout_secs,
            overlay.tier_timeout_secs,
            d.tier_timeout_secs,
        ),
        fetch_timeout_secs: pick(
            base.fetch_timeout_secs,
            overlay.fetch_timeout_secs,
            d.fetch_timeout_secs,
        ),
        reprobe_on_failure: pick(
            base.reprobe_on_failure,
            overlay.reprobe_on_failure,
            d.reprobe_on_failure,
        ),
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    let d = LoggingConfig::default();
    LoggingConfig {
        level: pick(base.level, overlay.level, d.level),
        format: pick(base.format, overlay.format, d.format),
    }
}
