//! Custody service transport
//!
//! The `CustodyTransport` trait abstracts the REST boundary of the custody
//! service so the orchestrator can run against the HTTP client, the
//! in-memory service, or any other implementation. Calls are synchronous
//! and may fail; classifying failures is the transport's job, retrying them
//! is the orchestrator's.

use crate::delegated::{DelegatedSigner, RegisterSignerBody};
use crate::intent::CreateRequestBody;
use crate::wallet::{BalanceQuery, CreateWalletBody, TokenBalance, WalletInfo};
use crate::{ApprovalSubmission, RemoteRequest, RequestKind, SignerRef};
use thiserror::Error;

pub mod memory;

pub use memory::{CallCounts, MemoryCustody};

/// Result type alias for transport calls
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Failure of a single call to the custody service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be made or was dropped
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the client timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The service answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Check if repeating the call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) | TransportError::Timeout(_) => true,
            TransportError::Http { status, .. } => *status == 429 || *status >= 500,
            TransportError::NotFound(_) | TransportError::Decode(_) => false,
        }
    }
}

/// REST surface of the custody service
pub trait CustodyTransport: Send + Sync {
    /// `POST /wallets`
    fn create_wallet(&self, body: &CreateWalletBody) -> TransportResult<WalletInfo>;

    /// `GET /wallets/{locator}`
    fn get_wallet(&self, locator: &str) -> TransportResult<WalletInfo>;

    /// `POST /wallets/{locator}/{transactions|signatures}`
    fn create_request(
        &self,
        locator: &str,
        kind: RequestKind,
        body: &CreateRequestBody,
    ) -> TransportResult<RemoteRequest>;

    /// `GET /wallets/{locator}/{transactions|signatures}/{id}`
    fn get_request(&self, locator: &str, kind: RequestKind, id: &str)
        -> TransportResult<RemoteRequest>;

    /// `POST /wallets/{locator}/{transactions|signatures}/{id}/approvals`
    fn approve_request(
        &self,
        locator: &str,
        kind: RequestKind,
        id: &str,
        approvals: &[ApprovalSubmission],
    ) -> TransportResult<RemoteRequest>;

    /// `POST /wallets/{locator}/signers`
    fn register_signer(
        &self,
        locator: &str,
        body: &RegisterSignerBody,
    ) -> TransportResult<DelegatedSigner>;

    /// `GET /wallets/{locator}/signers/{signer}`; `None` when not registered
    fn get_signer(
        &self,
        locator: &str,
        signer: &SignerRef,
    ) -> TransportResult<Option<DelegatedSigner>>;

    /// `GET /wallets/{locator}/balances`
    fn get_balances(
        &self,
        locator: &str,
        query: &BalanceQuery,
    ) -> TransportResult<Vec<TokenBalance>>;
}

impl<T: CustodyTransport + ?Sized> CustodyTransport for std::sync::Arc<T> {
    fn create_wallet(&self, body: &CreateWalletBody) -> TransportResult<WalletInfo> {
        (**self).create_wallet(body)
    }

    fn get_wallet(&self, locator: &str) -> TransportResult<WalletInfo> {
        (**self).get_wallet(locator)
    }

    fn create_request(
        &self,
        locator: &str,
        kind: RequestKind,
        body: &CreateRequestBody,
    ) -> TransportResult<RemoteRequest> {
        (**self).create_request(locator, kind, body)
    }

    fn get_request(
        &self,
        locator: &str,
        kind: RequestKind,
        id: &str,
    ) -> TransportResult<RemoteRequest> {
        (**self).get_request(locator, kind, id)
    }

    fn approve_request(
        &self,
        locator: &str,
        kind: RequestKind,
        id: &str,
        approvals: &[ApprovalSubmission],
    ) -> TransportResult<RemoteRequest> {
        (**self).approve_request(locator, kind, id, approvals)
    }

    fn register_signer(
        &self,
        locator: &str,
        body: &RegisterSignerBody,
    ) -> TransportResult<DelegatedSigner> {
        (**self).register_signer(locator, body)
    }

    fn get_signer(
        &self,
        locator: &str,
        signer: &SignerRef,
    ) -> TransportResult<Option<DelegatedSigner>> {
        (**self).get_signer(locator, signer)
    }

    fn get_balances(
        &self,
        locator: &str,
        query: &BalanceQuery,
    ) -> TransportResult<Vec<TokenBalance>> {
        (**self).get_balances(locator, query)
    }
}
