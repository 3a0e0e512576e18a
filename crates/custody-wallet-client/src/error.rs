//! Error types for building the HTTP client

use thiserror::Error;

/// Errors raised while configuring the client.
///
/// Failures of individual calls are reported as
/// [`TransportError`](custody_wallet_core::TransportError) instead.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Required environment variable not set
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;
