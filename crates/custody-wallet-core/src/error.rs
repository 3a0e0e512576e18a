//! Error types for custody wallet operations

use crate::transport::TransportError;
use crate::types::RequestStatus;
use thiserror::Error;

/// Result type alias for custody wallet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the orchestrator and wallet APIs.
///
/// Transport failures never leak through directly: they are folded into
/// [`Error::Submission`] once the retry budget is spent.
#[derive(Debug, Error)]
pub enum Error {
    // ============ Caller Errors ============
    /// Invalid or ambiguous locator or signer configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Operation is structurally disallowed for this wallet variant
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    // ============ Remote Errors ============
    /// The custody service could not be reached or rejected a call.
    ///
    /// `id` is set once the request exists remotely, i.e. for failures while
    /// reading its status or approving it.
    #[error("Submission failed during {stage}: {source}")]
    Submission {
        id: Option<String>,
        stage: &'static str,
        #[source]
        source: TransportError,
    },

    /// The custody service reported the request as failed
    #[error("Request {id} failed: {reason}")]
    RemoteFailure { id: String, reason: String },

    /// The custody service answered with a shape we cannot use
    #[error("Malformed response for request {id}: {detail}")]
    MalformedResponse { id: String, detail: String },

    // ============ Polling Errors ============
    /// Poll bound exhausted before a terminal status was observed
    #[error("Timed out after {attempts} status reads on request {id} (last status: {last_status})")]
    Timeout {
        id: String,
        last_status: RequestStatus,
        attempts: u32,
    },

    /// Cancellation was requested while polling
    #[error("Cancelled while waiting on request {id}")]
    Cancelled { id: String },

    // ============ Local Errors ============
    /// Key parsing, challenge decoding or signing failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Request id the caller can resume polling with, if any.
    pub fn resumable_id(&self) -> Option<&str> {
        match self {
            Error::Timeout { id, .. } | Error::Cancelled { id } => Some(id),
            Error::Submission { id, .. } => id.as_deref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Crypto(e.to_string())
    }
}
