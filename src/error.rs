//! Unified error types for Crowsnest

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for Crowsnest operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Config errors
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    // Output errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Container runtime errors
    #[error("Failed to connect to container runtime: {0}")]
    RuntimeConnect(String),

    #[error("Container runtime error: {0}")]
    Runtime(String),

    #[error("Container for service '{0}' not found")]
    ContainerNotFound(String),

    #[error("Failed to restart container for service '{service}': {message}")]
    RestartFailed { service: String, message: String },

    // Probe errors
    #[error("Probe of {url} timed out after {timeout:?}")]
    ProbeTimeout { url: String, timeout: Duration },

    #[error("Probe of {url} failed: {message}")]
    ProbeTransport { url: String, message: String },
}

impl Error {
    /// Whether this error is a probe timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ProbeTimeout { .. })
    }
}

/// Result type alias for Crowsnest operations
pub type Result<T> = std::result::Result<T, Error>;
