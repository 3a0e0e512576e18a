//! Solana smart wallet

use super::{SignatureReceipt, TransactionReceipt};
use crate::delegated::DelegatedSignerRegistry;
use crate::intent::Intent;
use crate::locator::WalletLocator;
use crate::orchestrator::{ApprovalOrchestrator, CancellationToken, PollPolicy};
use crate::signer::SignerConfig;
use crate::transport::CustodyTransport;
use crate::{ApprovalSubmission, ChainFamily, Error, RemoteRequest, RequestKind, Result};

#[cfg(feature = "solana")]
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{VersionedMessage, v0},
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
#[cfg(feature = "solana")]
use std::str::FromStr;

// bincode 1.x matches the wire format of Solana transactions
#[cfg(feature = "solana")]
use bincode1 as bincode;

/// Smart wallet on Solana
///
/// Requests may need approvals from several signers; success is only what
/// the custody service reports. Message signing is not available.
pub struct SolanaSmartWallet<T: CustodyTransport> {
    locator: WalletLocator,
    orchestrator: ApprovalOrchestrator<T>,
}

impl<T: CustodyTransport> SolanaSmartWallet<T> {
    pub fn new(
        transport: T,
        locator: WalletLocator,
        signer: SignerConfig,
        policy: PollPolicy,
    ) -> Result<Self> {
        if locator.family() != ChainFamily::Solana {
            return Err(Error::Configuration(format!(
                "{} is not a Solana wallet",
                locator.wallet_type()
            )));
        }
        signer.ensure_family(ChainFamily::Solana)?;
        policy.validate()?;

        Ok(Self {
            locator,
            orchestrator: ApprovalOrchestrator::new(transport, signer, policy),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.orchestrator = self.orchestrator.with_cancellation(token);
        self
    }

    pub fn locator(&self) -> &WalletLocator {
        &self.locator
    }

    pub fn orchestrator(&self) -> &ApprovalOrchestrator<T> {
        &self.orchestrator
    }

    pub fn delegated_signers(&self) -> DelegatedSignerRegistry<'_, T> {
        DelegatedSignerRegistry::new(self.orchestrator.transport())
    }

    /// Send a base58 serialized transaction
    pub fn send_transaction(&self, serialized: &str) -> Result<TransactionReceipt> {
        self.submit_transaction(&Intent::solana_transaction(serialized))
    }

    /// Send a transaction intent, e.g. one with required signers
    pub fn submit_transaction(&self, intent: &Intent) -> Result<TransactionReceipt> {
        if intent.kind() != RequestKind::Transaction {
            return Err(Error::Configuration("Intent is not a transaction".into()));
        }
        self.orchestrator
            .submit(&self.locator, intent)
            .map(TransactionReceipt::from)
    }

    /// Compile `instructions` with the wallet as fee payer and send them
    #[cfg(feature = "solana")]
    pub fn send_instructions(&self, instructions: &[Instruction]) -> Result<TransactionReceipt> {
        let payer = self.address()?;
        let serialized = serialize_instructions(&payer, instructions)?;
        self.send_transaction(&serialized)
    }

    /// Always fails: Solana smart wallets cannot sign arbitrary messages
    pub fn sign_message(&self, _message: &str) -> Result<SignatureReceipt> {
        Err(Error::UnsupportedOperation(
            "message signing is not available for Solana smart wallets".into(),
        ))
    }

    /// Keep polling a transaction created earlier
    pub fn resume_transaction(&self, id: &str) -> Result<TransactionReceipt> {
        self.orchestrator
            .resume(RequestKind::Transaction, self.locator.as_str(), id)
            .map(TransactionReceipt::from)
    }

    /// Approve a transaction as a co-signer, without polling it
    pub fn submit_approvals(
        &self,
        id: &str,
        approvals: &[ApprovalSubmission],
    ) -> Result<RemoteRequest> {
        self.orchestrator.approve(
            RequestKind::Transaction,
            self.locator.as_str(),
            id,
            approvals,
        )
    }

    /// Wallet address; looked up remotely when the locator is a linked user
    #[cfg(feature = "solana")]
    fn address(&self) -> Result<Pubkey> {
        if let Ok(pubkey) = Pubkey::from_str(self.locator.as_str()) {
            return Ok(pubkey);
        }
        let wallet = self
            .orchestrator
            .transport()
            .get_wallet(self.locator.as_str())
            .map_err(|source| Error::Submission {
                id: None,
                stage: "get wallet",
                source,
            })?;
        Pubkey::from_str(&wallet.address)
            .map_err(|e| Error::Configuration(format!("Invalid wallet address {}: {}", wallet.address, e)))
    }
}

/// Compile instructions into an unsigned base58 v0 transaction.
///
/// The blockhash is a placeholder and every signature slot is empty; the
/// custody service fills both in.
#[cfg(feature = "solana")]
pub fn serialize_instructions(payer: &Pubkey, instructions: &[Instruction]) -> Result<String> {
    if instructions.is_empty() {
        return Err(Error::Configuration("No instructions to send".into()));
    }

    let message = v0::Message::try_compile(payer, instructions, &[], Hash::default())
        .map_err(|e| Error::Serialization(format!("Failed to compile message: {}", e)))?;
    let signatures = vec![Signature::default(); message.header.num_required_signatures as usize];
    let tx = VersionedTransaction {
        signatures,
        message: VersionedMessage::V0(message),
    };

    let bytes = bincode::serialize(&tx)
        .map_err(|e| Error::Serialization(format!("Failed to serialize transaction: {}", e)))?;
    Ok(bs58::encode(bytes).into_string())
}
