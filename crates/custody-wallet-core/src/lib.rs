//! # Custody Wallet Core
//!
//! Approval orchestration for smart wallets whose keys are held by a remote
//! custody service, by this process, or by several parties at once.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Wallet Locators**: canonical keys for wallets known by address or by linked user
//! - **Signer Configuration**: local EVM/Solana keypairs, custodial and Fireblocks signers
//! - **Approval Orchestrator**: a bounded, cancellable poll loop that signs or
//!   forwards pending approvals until the request succeeds or fails
//! - **Chain Wallets**: EVM call batches, typed data and messages; Solana
//!   serialized transactions and instruction lists
//! - **Delegated Signers**: registration and expiry-aware lookup of co-signers
//! - **Transports**: the [`CustodyTransport`] seam and an in-memory custody service
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use custody_wallet_core::{Chain, EvmSmartWallet, PollPolicy, SignerConfig, WalletLocator};
//! use custody_wallet_core::intent::EvmCall;
//! use custody_wallet_core::locator::{LinkedUser, WalletType};
//! use custody_wallet_core::signer::EvmKeypair;
//!
//! let user = LinkedUser::Email("agent@example.com".into());
//! let locator = WalletLocator::from_linked_user(&user, WalletType::EvmSmartWallet)?;
//! let signer = SignerConfig::local(EvmKeypair::from_hex(&secret)?);
//!
//! let wallet = EvmSmartWallet::new(transport, locator, signer, PollPolicy::local_signer())?;
//! let receipt = wallet.send_transaction(Chain::Base, vec![EvmCall::transfer(to, "1000")])?;
//! println!("{:?}", receipt.tx_id);
//! ```
//!
//! ## Approval Model
//!
//! A request succeeds only when the custody service says so. Local keypairs
//! sign the single pending approval addressed to them; everything else is
//! left to the caller's pre-computed signatures or to other parties.

pub mod chain;
pub mod delegated;
pub mod error;
pub mod intent;
pub mod locator;
pub mod orchestrator;
pub mod signer;
pub mod transport;
pub mod types;
pub mod wallet;

#[cfg(feature = "runtime")]
pub mod task;

pub use chain::{EvmSmartWallet, SignatureReceipt, SolanaSmartWallet, TransactionReceipt};
pub use delegated::{DelegatedSigner, DelegatedSignerRegistry, Permission, SignerCheck};
pub use error::{Error, Result};
pub use intent::{EvmCall, Intent, Payload};
pub use locator::{LinkedUser, WalletLocator, WalletType};
pub use orchestrator::{ApprovalOrchestrator, CancellationToken, PollBound, PollPolicy};
pub use signer::{EvmKeypair, LocalKeypair, SignerConfig, SolanaKeypair};
pub use transport::{CustodyTransport, MemoryCustody, TransportError};
pub use types::{
    ApprovalSubmission, Approvals, Chain, ChainFamily, OnChain, PendingApproval, RemoteError,
    RemoteRequest, RequestKind, RequestStatus, SignerRef,
};
pub use wallet::{TokenBalance, WalletInfo, WalletManager};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
