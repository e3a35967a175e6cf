//! Error types shared between the collaborator crates.

use thiserror::Error;

/// Errors from the relevance-ranking backends.
#[derive(Debug, Error)]
pub enum RankError {
    #[error("Ranking backend '{backend}' is misconfigured: {message}")]
    Config { backend: String, message: String },

    #[error("Network error talking to '{backend}': {message}")]
    Network { backend: String, message: String },

    #[error("'{backend}' returned HTTP {status}: {message}")]
    Http {
        backend: String,
        status: u16,
        message: String,
    },

    #[error("'{backend}' reply could not be parsed as a list of tool names: {message}")]
    BadReply { backend: String, message: String },
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
