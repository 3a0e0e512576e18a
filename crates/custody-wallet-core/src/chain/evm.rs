//! EVM smart wallet

use super::{SignatureReceipt, TransactionReceipt};
use crate::delegated::DelegatedSignerRegistry;
use crate::intent::{EvmCall, Intent};
use crate::locator::WalletLocator;
use crate::orchestrator::{ApprovalOrchestrator, CancellationToken, PollPolicy};
use crate::signer::SignerConfig;
use crate::transport::CustodyTransport;
use crate::{ApprovalSubmission, Chain, ChainFamily, Error, RemoteRequest, RequestKind, Result};
use serde_json::Value;

/// Smart contract wallet on an EVM chain
///
/// Transactions are call batches executed atomically by the wallet; the
/// approval challenge is the user-operation hash, signed as a personal
/// message by local keypairs.
pub struct EvmSmartWallet<T: CustodyTransport> {
    locator: WalletLocator,
    orchestrator: ApprovalOrchestrator<T>,
}

impl<T: CustodyTransport> EvmSmartWallet<T> {
    pub fn new(
        transport: T,
        locator: WalletLocator,
        signer: SignerConfig,
        policy: PollPolicy,
    ) -> Result<Self> {
        if locator.family() != ChainFamily::Evm {
            return Err(Error::Configuration(format!(
                "{} is not an EVM wallet",
                locator.wallet_type()
            )));
        }
        signer.ensure_family(ChainFamily::Evm)?;
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

    /// Delegated signers of this wallet
    pub fn delegated_signers(&self) -> DelegatedSignerRegistry<'_, T> {
        DelegatedSignerRegistry::new(self.orchestrator.transport())
    }

    /// Send a batch of calls as one transaction
    pub fn send_transaction(&self, chain: Chain, calls: Vec<EvmCall>) -> Result<TransactionReceipt> {
        self.submit_transaction(&Intent::calls(chain, calls))
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

    /// Sign a plain message with the wallet
    pub fn sign_message(&self, chain: Chain, message: &str) -> Result<SignatureReceipt> {
        self.submit_signature(&Intent::message(chain, message))
    }

    /// Sign EIP-712 typed data; `domain.chainId` is set to `chain`'s id
    pub fn sign_typed_data(&self, chain: Chain, typed_data: Value) -> Result<SignatureReceipt> {
        let typed_data = embed_chain_id(typed_data, chain)?;
        self.submit_signature(&Intent::typed_data(chain, typed_data))
    }

    /// Sign a signature intent
    pub fn submit_signature(&self, intent: &Intent) -> Result<SignatureReceipt> {
        if intent.kind() != RequestKind::Signature {
            return Err(Error::Configuration("Intent is not a signature".into()));
        }
        self.orchestrator
            .submit(&self.locator, intent)
            .and_then(SignatureReceipt::try_from)
    }

    /// Keep polling a transaction created earlier
    pub fn resume_transaction(&self, id: &str) -> Result<TransactionReceipt> {
        self.orchestrator
            .resume(RequestKind::Transaction, self.locator.as_str(), id)
            .map(TransactionReceipt::from)
    }

    /// Keep polling a signature created earlier
    pub fn resume_signature(&self, id: &str) -> Result<SignatureReceipt> {
        self.orchestrator
            .resume(RequestKind::Signature, self.locator.as_str(), id)
            .and_then(SignatureReceipt::try_from)
    }

    /// Approve a request as a co-signer, without polling it
    pub fn submit_approvals(
        &self,
        kind: RequestKind,
        id: &str,
        approvals: &[ApprovalSubmission],
    ) -> Result<RemoteRequest> {
        self.orchestrator
            .approve(kind, self.locator.as_str(), id, approvals)
    }
}

/// Set `domain.chainId` on typed data
pub fn embed_chain_id(mut typed_data: Value, chain: Chain) -> Result<Value> {
    let chain_id = chain
        .chain_id()
        .ok_or_else(|| Error::Configuration(format!("{} has no EVM chain id", chain)))?;
    let domain = typed_data
        .get_mut("domain")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| Error::Configuration("Typed data needs a `domain` object".into()))?;
    domain.insert("chainId".into(), Value::from(chain_id));
    Ok(typed_data)
}
