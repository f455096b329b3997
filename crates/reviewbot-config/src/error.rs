//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Filesystem operation that failed on a config path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Read,
    Write,
    CreateDir,
}

impl std::fmt::Display for FileOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FileOp::Read => "read config file",
            FileOp::Write => "write config file",
            FileOp::CreateDir => "create config directory",
        })
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to {op} '{path}': {source}")]
    File {
        op: FileOp,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid reviewbot TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to render config as TOML: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("could not determine home directory")]
    NoHomeDir,

    /// A single setting is out of range or malformed
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// A secret named by an `*_env` setting is not set
    #[error("environment variable '{name}' (from {key}) is not set")]
    MissingSecret { key: String, name: String },

    /// Settings that are fine one by one but do not fit together
    #[error("configuration validation failed: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn file(op: FileOp, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::file(FileOp::Read, path, source)
    }

    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::file(FileOp::Write, path, source)
    }

    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::file(FileOp::CreateDir, path, source)
    }

    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn missing_secret(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self::MissingSecret {
            key: key.into(),
            name: name.into(),
        }
    }

    /// Whether the error is about a missing file rather than its contents
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ConfigError::File { op: FileOp::Read, source, .. }
                if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
