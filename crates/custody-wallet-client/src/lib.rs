//! # Custody Wallet Client
//!
//! Blocking HTTP transport for the custody wallet API.
//!
//! [`HttpTransport`] implements [`CustodyTransport`](custody_wallet_core::CustodyTransport)
//! over the service's REST routes, so it plugs straight into the wallets and
//! the approval orchestrator of `custody-wallet-core`:
//!
//! ```rust,ignore
//! use custody_wallet_client::HttpTransport;
//! use custody_wallet_core::{EvmSmartWallet, PollPolicy, SignerConfig};
//!
//! let transport = HttpTransport::from_env()?;
//! let wallet = EvmSmartWallet::new(transport, locator, signer, PollPolicy::local_signer())?;
//! ```

pub mod config;
pub mod error;
pub mod http;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use http::HttpTransport;
