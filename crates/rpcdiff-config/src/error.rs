//! Error types for configuration loading

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading configuration, variants or API specs
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Failed to parse JSON
    #[error("failed to parse JSON from {source_name}: {source}")]
    ParseJson {
        source_name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to fetch a remote API specification
    #[error("failed to fetch API specification from {url}: {source}")]
    FetchSpec {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Include file not found
    #[error("included file not found: {path}")]
    IncludeNotFound { path: PathBuf },

    /// Circular include detected
    #[error("circular include detected: {path}")]
    CircularInclude { path: PathBuf },

    /// Environment variable not found
    #[error("environment variable '{var}' not set")]
    EnvVarNotFound { var: String },

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// Configuration validation failed
    #[error("configuration validation failed: {message}")]
    ValidationFailed { message: String },
}
