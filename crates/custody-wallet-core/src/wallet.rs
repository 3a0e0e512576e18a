//! Wallet management
//!
//! Creating wallets, looking them up, and reading token balances.

use crate::locator::{LinkedUser, WalletLocator, WalletType};
use crate::signer::SignerConfig;
use crate::transport::{CustodyTransport, TransportError};
use crate::{Chain, Error, Result, SignerRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Body of `POST /wallets`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletBody {
    #[serde(rename = "type")]
    pub wallet_type: WalletType,
    pub admin_signer: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_user: Option<String>,
}

/// Wallet as the custody service reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    pub address: String,
    #[serde(rename = "type")]
    pub wallet_type: WalletType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_signer: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl WalletInfo {
    /// Address locator for this wallet
    pub fn locator(&self) -> Result<WalletLocator> {
        WalletLocator::from_address(&self.address, self.wallet_type)
    }

    /// Reference of the admin signer, when the service reported one
    pub fn admin_ref(&self) -> Option<SignerRef> {
        self.admin_signer.as_ref().map(admin_signer_ref)
    }
}

/// Signer reference named by an `adminSigner` block.
///
/// Keypairs are `{type, address}`, custodial signers carry a `locator`,
/// anything else is identified by its type alone.
pub fn admin_signer_ref(admin: &serde_json::Value) -> SignerRef {
    let field = |name: &str| admin.get(name).and_then(serde_json::Value::as_str);
    let kind = field("type").unwrap_or_default();
    match (field("address"), field("locator")) {
        (Some(address), _) => SignerRef::new(format!("{}:{}", kind, address)),
        (None, Some(locator)) => SignerRef::new(locator),
        (None, None) => SignerRef::new(kind),
    }
}

/// Filter for a balance read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceQuery {
    pub chains: Vec<Chain>,
    pub tokens: Vec<String>,
}

impl BalanceQuery {
    pub fn new(chains: Vec<Chain>, tokens: Vec<String>) -> Self {
        Self { chains, tokens }
    }

    /// Query string pairs, comma-joined
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let chains = self
            .chains
            .iter()
            .map(Chain::as_str)
            .collect::<Vec<_>>()
            .join(",");
        vec![("chains", chains), ("tokens", self.tokens.join(","))]
    }

    /// Whether a balance row passes this filter
    pub fn admits(&self, balance: &TokenBalance) -> bool {
        let chain_ok = match balance.chain {
            Some(chain) => self.chains.is_empty() || self.chains.contains(&chain),
            None => true,
        };
        let token_ok = self.tokens.is_empty()
            || self
                .tokens
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&balance.token));
        chain_ok && token_ok
    }
}

/// Balance of one token held by a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    /// Token symbol or mint/contract
    pub token: String,
    pub decimals: u8,
    /// Amount in the smallest unit, decimal string
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<Chain>,
}

impl TokenBalance {
    pub fn new(token: impl Into<String>, decimals: u8, amount: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            decimals,
            amount: amount.into(),
            chain: None,
        }
    }

    pub fn on_chain(mut self, chain: Chain) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Human-readable amount; the raw amount if it does not fit a `u128`
    pub fn formatted(&self) -> String {
        let Ok(raw) = self.amount.parse::<u128>() else {
            return self.amount.clone();
        };
        if raw == 0 {
            return "0".to_string();
        }
        let Some(divisor) = 10u128.checked_pow(self.decimals as u32) else {
            return self.amount.clone();
        };

        let whole = raw / divisor;
        let fraction = raw % divisor;
        if fraction == 0 {
            return whole.to_string();
        }

        let fraction = format!("{:0>width$}", fraction, width = self.decimals as usize);
        format!("{}.{}", whole, fraction.trim_end_matches('0'))
    }
}

/// Creates and inspects wallets
pub struct WalletManager<T: CustodyTransport> {
    transport: T,
}

impl<T: CustodyTransport> WalletManager<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Create a wallet administered by `admin`
    pub fn create_wallet(
        &self,
        wallet_type: WalletType,
        admin: &SignerConfig,
        linked_user: Option<&LinkedUser>,
    ) -> Result<WalletInfo> {
        admin.ensure_family(wallet_type.family())?;
        if let Some(user) = linked_user {
            user.clone().validated()?;
        }

        let body = CreateWalletBody {
            wallet_type,
            admin_signer: admin.admin_signer_json(),
            linked_user: linked_user.map(ToString::to_string),
        };
        let wallet = self
            .transport
            .create_wallet(&body)
            .map_err(|source| Error::Submission {
                id: None,
                stage: "create wallet",
                source,
            })?;

        info!(address = %wallet.address, wallet_type = %wallet.wallet_type, "Wallet created");
        Ok(wallet)
    }

    /// Fetch a wallet by locator
    pub fn get_wallet(&self, locator: &str) -> Result<WalletInfo> {
        match self.transport.get_wallet(locator) {
            Ok(wallet) => Ok(wallet),
            Err(TransportError::NotFound(_)) => {
                Err(Error::Configuration(format!("Wallet not found: {}", locator)))
            }
            Err(source) => Err(Error::Submission {
                id: None,
                stage: "get wallet",
                source,
            }),
        }
    }

    /// Balances of `tokens` on `chains`
    pub fn get_balances(
        &self,
        locator: &str,
        chains: &[Chain],
        tokens: &[String],
    ) -> Result<Vec<TokenBalance>> {
        if tokens.is_empty() {
            return Err(Error::Configuration("At least one token is required".into()));
        }

        let query = BalanceQuery::new(chains.to_vec(), tokens.to_vec());
        let balances = self
            .transport
            .get_balances(locator, &query)
            .map_err(|source| Error::Submission {
                id: None,
                stage: "get balances",
                source,
            })?;

        debug!(locator, count = balances.len(), "Balances fetched");
        Ok(balances)
    }
}
