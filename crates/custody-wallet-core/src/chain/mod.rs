//! Chain-specific wallets
//!
//! Each wallet pairs a locator with an [`ApprovalOrchestrator`] and exposes
//! only the operations its chain family supports.
//!
//! [`ApprovalOrchestrator`]: crate::ApprovalOrchestrator

pub mod evm;
pub mod solana;

pub use evm::EvmSmartWallet;
pub use solana::SolanaSmartWallet;

use crate::{Error, RemoteRequest, Result};
use serde::{Deserialize, Serialize};

/// Outcome of a successful transaction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// Custody service request id
    pub id: String,
    /// On-chain id, when the service reported one
    pub tx_id: Option<String>,
    pub explorer_link: Option<String>,
}

impl From<RemoteRequest> for TransactionReceipt {
    fn from(request: RemoteRequest) -> Self {
        let (tx_id, explorer_link) = request
            .on_chain
            .map(|o| (o.tx_id, o.explorer_link))
            .unwrap_or_default();
        Self {
            id: request.id,
            tx_id,
            explorer_link,
        }
    }
}

/// Outcome of a successful signature request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureReceipt {
    pub id: String,
    pub signature: String,
}

impl TryFrom<RemoteRequest> for SignatureReceipt {
    type Error = Error;

    fn try_from(request: RemoteRequest) -> Result<Self> {
        match request.output_signature {
            Some(signature) => Ok(Self {
                id: request.id,
                signature,
            }),
            None => Err(Error::MalformedResponse {
                id: request.id,
                detail: "signature succeeded without outputSignature".into(),
            }),
        }
    }
}
