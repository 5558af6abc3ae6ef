//! Error types for the edaflow core library.

use thiserror::Error;

use crate::report::ReportError;

/// Result type alias using the core `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for edaflow operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing option, unreadable file, bad value)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Manifest persistence error
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Report extraction error
    #[error(transparent)]
    Report(#[from] ReportError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
