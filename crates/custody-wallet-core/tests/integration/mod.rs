//! Integration tests module
//!
//! End-to-end flows through the orchestrator:
//! - EVM and Solana wallets
//! - Multi-signer quorum
//! - Timeouts, cancellation and resumption
//! - Wallet management

pub mod solana_flow_test;
pub mod wallet_test;
