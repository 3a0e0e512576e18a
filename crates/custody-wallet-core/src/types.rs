//! Core types for custody wallets
//!
//! Chains and chain families, signer references, and the request/approval
//! shapes exchanged with the custody service.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Family of chains sharing a signing scheme and wallet program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    /// Ethereum and EVM-compatible chains
    Evm,
    /// Solana
    Solana,
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFamily::Evm => write!(f, "EVM"),
            ChainFamily::Solana => write!(f, "Solana"),
        }
    }
}

/// Chains the custody service can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Chain {
    Ethereum,
    EthereumSepolia,
    Base,
    BaseSepolia,
    Polygon,
    PolygonAmoy,
    Arbitrum,
    ArbitrumSepolia,
    Optimism,
    OptimismSepolia,
    Solana,
}

impl Chain {
    /// All supported chains
    pub const ALL: [Chain; 11] = [
        Chain::Ethereum,
        Chain::EthereumSepolia,
        Chain::Base,
        Chain::BaseSepolia,
        Chain::Polygon,
        Chain::PolygonAmoy,
        Chain::Arbitrum,
        Chain::ArbitrumSepolia,
        Chain::Optimism,
        Chain::OptimismSepolia,
        Chain::Solana,
    ];

    /// Wire name of the chain
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::EthereumSepolia => "ethereum-sepolia",
            Chain::Base => "base",
            Chain::BaseSepolia => "base-sepolia",
            Chain::Polygon => "polygon",
            Chain::PolygonAmoy => "polygon-amoy",
            Chain::Arbitrum => "arbitrum",
            Chain::ArbitrumSepolia => "arbitrum-sepolia",
            Chain::Optimism => "optimism",
            Chain::OptimismSepolia => "optimism-sepolia",
            Chain::Solana => "solana",
        }
    }

    /// Chain family this chain belongs to
    pub fn family(&self) -> ChainFamily {
        match self {
            Chain::Solana => ChainFamily::Solana,
            _ => ChainFamily::Evm,
        }
    }

    /// EIP-155 chain id (EVM chains only)
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Chain::Ethereum => Some(1),
            Chain::EthereumSepolia => Some(11155111),
            Chain::Base => Some(8453),
            Chain::BaseSepolia => Some(84532),
            Chain::Polygon => Some(137),
            Chain::PolygonAmoy => Some(80002),
            Chain::Arbitrum => Some(42161),
            Chain::ArbitrumSepolia => Some(421614),
            Chain::Optimism => Some(10),
            Chain::OptimismSepolia => Some(11155420),
            Chain::Solana => None,
        }
    }

    /// Check if this is an EVM chain
    pub fn is_evm(&self) -> bool {
        self.family() == ChainFamily::Evm
    }

    /// Check if this is Solana
    pub fn is_solana(&self) -> bool {
        self.family() == ChainFamily::Solana
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Chain::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::Configuration(format!("Unknown chain: {}", s)))
    }
}

/// Reference to a signer as the custody service addresses it.
///
/// Local keypairs use the `evm-keypair:<address>` and
/// `solana-keypair:<pubkey>` forms; any other reference is opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignerRef(String);

impl SignerRef {
    pub const EVM_KEYPAIR: &'static str = "evm-keypair";
    pub const SOLANA_KEYPAIR: &'static str = "solana-keypair";

    /// Wrap an opaque reference
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Reference for an EVM keypair address
    pub fn evm_keypair(address: &str) -> Self {
        Self(format!("{}:{}", Self::EVM_KEYPAIR, address))
    }

    /// Reference for a Solana keypair public key
    pub fn solana_keypair(pubkey: &str) -> Self {
        Self(format!("{}:{}", Self::SOLANA_KEYPAIR, pubkey))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scheme prefix (`evm-keypair`, `solana-keypair`, ...) if present
    pub fn scheme(&self) -> Option<&str> {
        self.0.split_once(':').map(|(scheme, _)| scheme)
    }

    /// Identifier without its scheme prefix
    pub fn value(&self) -> &str {
        self.0.split_once(':').map(|(_, v)| v).unwrap_or(&self.0)
    }

    /// Whether two references name the same signer.
    ///
    /// The service may echo a bare address where we sent a prefixed
    /// reference, and EVM addresses compare case-insensitively.
    pub fn matches(&self, other: &SignerRef) -> bool {
        if self.0 == other.0 {
            return true;
        }
        if let (Some(a), Some(b)) = (self.scheme(), other.scheme()) {
            if a != b {
                return false;
            }
        }
        let (a, b) = (self.value(), other.value());
        if a.starts_with("0x") && b.starts_with("0x") {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }
}

impl fmt::Display for SignerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SignerRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SignerRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Sub-resource a remote request lives under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Transaction,
    Signature,
}

impl RequestKind {
    /// Path segment under `/wallets/{locator}/`
    pub fn path_segment(&self) -> &'static str {
        match self {
            RequestKind::Transaction => "transactions",
            RequestKind::Signature => "signatures",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Transaction => write!(f, "transaction"),
            RequestKind::Signature => write!(f, "signature"),
        }
    }
}

/// Status reported by the custody service for a request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestStatus {
    Pending,
    AwaitingApproval,
    Success,
    Failed,
    /// A status this client does not know; treated as non-terminal
    Unknown(String),
}

impl RequestStatus {
    /// Check if the request will never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Success | RequestStatus::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::AwaitingApproval => "awaiting-approval",
            RequestStatus::Success => "success",
            RequestStatus::Failed => "failed",
            RequestStatus::Unknown(s) => s,
        }
    }
}

impl From<String> for RequestStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => RequestStatus::Pending,
            "awaiting-approval" => RequestStatus::AwaitingApproval,
            "success" => RequestStatus::Success,
            "failed" => RequestStatus::Failed,
            _ => RequestStatus::Unknown(s),
        }
    }
}

impl From<RequestStatus> for String {
    fn from(status: RequestStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval still expected from a signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub signer: SignerRef,
    /// Challenge the signer must sign
    pub message: String,
}

/// Signature given for a pending approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSubmission {
    pub signer: SignerRef,
    pub signature: String,
}

impl ApprovalSubmission {
    pub fn new(signer: SignerRef, signature: impl Into<String>) -> Self {
        Self {
            signer,
            signature: signature.into(),
        }
    }
}

/// Approval bookkeeping as the custody service reports it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approvals {
    #[serde(default)]
    pub pending: Vec<PendingApproval>,
    #[serde(default)]
    pub submitted: Vec<ApprovalSubmission>,
}

impl Approvals {
    /// Pending entry addressed to `signer`, if any
    pub fn pending_for(&self, signer: &SignerRef) -> Option<&PendingApproval> {
        self.pending.iter().find(|p| p.signer.matches(signer))
    }

    /// Whether `signer` already appears among submitted approvals
    pub fn has_submitted(&self, signer: &SignerRef) -> bool {
        self.submitted.iter().any(|s| s.signer.matches(signer))
    }
}

/// On-chain outcome of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnChain {
    #[serde(default)]
    pub tx_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_link: Option<String>,
}

/// Failure detail; the service sends either a bare string or an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteError {
    Message(String),
    Detail {
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl RemoteError {
    /// Reason text exactly as the service phrased it
    pub fn reason(&self) -> String {
        match self {
            RemoteError::Message(m) => m.clone(),
            RemoteError::Detail { reason, message } => match (reason, message) {
                (Some(r), Some(m)) => format!("{}: {}", r, m),
                (Some(r), None) => r.clone(),
                (None, Some(m)) => m.clone(),
                (None, None) => String::new(),
            },
        }
    }
}

/// Transaction or signature request held by the custody service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRequest {
    pub id: String,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approvals: Option<Approvals>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_chain: Option<OnChain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
}

impl RemoteRequest {
    /// Bare request in the given status
    pub fn new(id: impl Into<String>, status: RequestStatus) -> Self {
        Self {
            id: id.into(),
            status,
            approvals: None,
            on_chain: None,
            output_signature: None,
            error: None,
        }
    }

    /// Pending approvals, empty when the service sent none
    pub fn pending(&self) -> &[PendingApproval] {
        self.approvals
            .as_ref()
            .map(|a| a.pending.as_slice())
            .unwrap_or(&[])
    }

    /// On-chain transaction id, once known
    pub fn tx_id(&self) -> Option<&str> {
        self.on_chain.as_ref().and_then(|o| o.tx_id.as_deref())
    }

    /// Failure reason as reported, empty if none was sent
    pub fn failure_reason(&self) -> String {
        self.error.as_ref().map(RemoteError::reason).unwrap_or_default()
    }
}
