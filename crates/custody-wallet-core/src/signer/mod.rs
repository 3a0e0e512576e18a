//! # Signer Configuration
//!
//! Who may authorize operations for a wallet. A wallet has exactly one admin
//! signer, fixed for the lifetime of the client:
//!
//! - **LocalKeypair**: key material held in this process; approvals are
//!   signed inline (secp256k1 for EVM, Ed25519 for Solana)
//! - **CustodialRemote**: the key never leaves the custody service
//! - **FireblocksCustodial**: Solana wallets whose admin key lives in Fireblocks
//!
//! Only local keypairs can sign. For the other variants outstanding approvals
//! are left to an external actor.

pub mod evm;
pub mod solana;

pub use evm::EvmKeypair;
pub use solana::SolanaKeypair;

use crate::{ChainFamily, Error, Result, SignerRef};
use serde_json::json;

/// Key material held by this process
#[derive(Debug, Clone)]
pub enum LocalKeypair {
    Evm(EvmKeypair),
    Solana(SolanaKeypair),
}

impl LocalKeypair {
    pub fn family(&self) -> ChainFamily {
        match self {
            LocalKeypair::Evm(_) => ChainFamily::Evm,
            LocalKeypair::Solana(_) => ChainFamily::Solana,
        }
    }

    pub fn signer_ref(&self) -> SignerRef {
        match self {
            LocalKeypair::Evm(kp) => kp.signer_ref(),
            LocalKeypair::Solana(kp) => kp.signer_ref(),
        }
    }

    /// Sign a challenge with the family's scheme and wire encoding
    pub fn sign_challenge(&self, challenge: &str) -> Result<String> {
        match self {
            LocalKeypair::Evm(kp) => kp.sign_challenge(challenge),
            LocalKeypair::Solana(kp) => kp.sign_challenge(challenge),
        }
    }

    /// Address or public key of the keypair
    pub fn address(&self) -> &str {
        match self {
            LocalKeypair::Evm(kp) => kp.address(),
            LocalKeypair::Solana(kp) => kp.public_key(),
        }
    }
}

impl From<EvmKeypair> for LocalKeypair {
    fn from(kp: EvmKeypair) -> Self {
        LocalKeypair::Evm(kp)
    }
}

impl From<SolanaKeypair> for LocalKeypair {
    fn from(kp: SolanaKeypair) -> Self {
        LocalKeypair::Solana(kp)
    }
}

/// Admin signer of a wallet
#[derive(Debug, Clone)]
pub enum SignerConfig {
    LocalKeypair(LocalKeypair),
    CustodialRemote { reference: SignerRef },
    FireblocksCustodial,
}

impl SignerConfig {
    /// Identity Fireblocks-custodial wallets are approved under
    pub const FIREBLOCKS_REF: &'static str = "solana-fireblocks-custodial";

    pub fn local(keypair: impl Into<LocalKeypair>) -> Self {
        SignerConfig::LocalKeypair(keypair.into())
    }

    pub fn custodial(reference: impl Into<SignerRef>) -> Self {
        SignerConfig::CustodialRemote {
            reference: reference.into(),
        }
    }

    /// Whether approvals can be produced in this process
    pub fn can_sign_locally(&self) -> bool {
        match self {
            SignerConfig::LocalKeypair(_) => true,
            SignerConfig::CustodialRemote { .. } | SignerConfig::FireblocksCustodial => false,
        }
    }

    /// Reference used to tag approvals from this signer
    pub fn signer_identity(&self) -> SignerRef {
        match self {
            SignerConfig::LocalKeypair(kp) => kp.signer_ref(),
            SignerConfig::CustodialRemote { reference } => reference.clone(),
            SignerConfig::FireblocksCustodial => SignerRef::new(Self::FIREBLOCKS_REF),
        }
    }

    /// Sign a challenge; fails for signers whose key is held remotely
    pub fn sign(&self, challenge: &str) -> Result<String> {
        match self {
            SignerConfig::LocalKeypair(kp) => kp.sign_challenge(challenge),
            SignerConfig::CustodialRemote { reference } => Err(Error::UnsupportedOperation(
                format!("custodial signer {} cannot sign locally", reference),
            )),
            SignerConfig::FireblocksCustodial => Err(Error::UnsupportedOperation(
                "Fireblocks-custodial signer cannot sign locally".into(),
            )),
        }
    }

    /// Reject configurations that cannot serve a wallet of `family`
    pub fn ensure_family(&self, family: ChainFamily) -> Result<()> {
        let mismatch = match self {
            SignerConfig::LocalKeypair(kp) => kp.family() != family,
            SignerConfig::CustodialRemote { .. } => false,
            SignerConfig::FireblocksCustodial => family != ChainFamily::Solana,
        };
        if mismatch {
            return Err(Error::Configuration(format!(
                "{} signer cannot administer a {} wallet",
                self.kind(),
                family
            )));
        }
        Ok(())
    }

    /// Admin signer block for wallet creation
    pub fn admin_signer_json(&self) -> serde_json::Value {
        match self {
            SignerConfig::LocalKeypair(kp) => {
                let scheme = kp.signer_ref().scheme().unwrap_or_default().to_string();
                json!({ "type": scheme, "address": kp.address() })
            }
            SignerConfig::CustodialRemote { reference } => {
                json!({ "type": "api-key", "locator": reference })
            }
            SignerConfig::FireblocksCustodial => json!({ "type": Self::FIREBLOCKS_REF }),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            SignerConfig::LocalKeypair(LocalKeypair::Evm(_)) => "EVM keypair",
            SignerConfig::LocalKeypair(LocalKeypair::Solana(_)) => "Solana keypair",
            SignerConfig::CustodialRemote { .. } => "Custodial",
            SignerConfig::FireblocksCustodial => "Fireblocks-custodial",
        }
    }
}
