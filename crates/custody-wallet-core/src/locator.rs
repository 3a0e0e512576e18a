//! Wallet locators
//!
//! The custody service addresses a wallet either by its raw address or by
//! the user it is linked to, qualified with the wallet type:
//!
//! ```text
//! 0x1234...abcd
//! email:a@b.com:solana-smart-wallet
//! phone-number:+15550100:evm-smart-wallet
//! userId:u_42:evm-mpc-wallet
//! ```

use crate::{ChainFamily, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of wallet held by the custody service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WalletType {
    EvmSmartWallet,
    EvmMpcWallet,
    SolanaSmartWallet,
    SolanaCustodialWallet,
}

impl WalletType {
    /// Suffix used in linked-user locators
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::EvmSmartWallet => "evm-smart-wallet",
            WalletType::EvmMpcWallet => "evm-mpc-wallet",
            WalletType::SolanaSmartWallet => "solana-smart-wallet",
            WalletType::SolanaCustodialWallet => "solana-custodial-wallet",
        }
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            WalletType::EvmSmartWallet | WalletType::EvmMpcWallet => ChainFamily::Evm,
            WalletType::SolanaSmartWallet | WalletType::SolanaCustodialWallet => {
                ChainFamily::Solana
            }
        }
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "evm-smart-wallet" => Ok(WalletType::EvmSmartWallet),
            "evm-mpc-wallet" => Ok(WalletType::EvmMpcWallet),
            "solana-smart-wallet" => Ok(WalletType::SolanaSmartWallet),
            "solana-custodial-wallet" => Ok(WalletType::SolanaCustodialWallet),
            other => Err(Error::Configuration(format!(
                "Unknown wallet type: {}",
                other
            ))),
        }
    }
}

/// User a wallet is linked to; exactly one identifier by construction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkedUser {
    Email(String),
    Phone(String),
    UserId(String),
}

impl LinkedUser {
    /// Build from loose optional fields, rejecting zero or several identifiers.
    pub fn from_fields(
        email: Option<&str>,
        phone: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Self> {
        let mut present = [
            email.map(|v| LinkedUser::Email(v.to_string())),
            phone.map(|v| LinkedUser::Phone(v.to_string())),
            user_id.map(|v| LinkedUser::UserId(v.to_string())),
        ]
        .into_iter()
        .flatten();

        match (present.next(), present.next()) {
            (Some(user), None) => user.validated(),
            (None, _) => Err(Error::Configuration(
                "Linked user needs an email, phone or user id".into(),
            )),
            (Some(_), Some(_)) => Err(Error::Configuration(
                "Linked user must have exactly one of email, phone or user id".into(),
            )),
        }
    }

    /// Locator scheme for this identifier
    pub fn scheme(&self) -> &'static str {
        match self {
            LinkedUser::Email(_) => "email",
            LinkedUser::Phone(_) => "phone-number",
            LinkedUser::UserId(_) => "userId",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            LinkedUser::Email(v) | LinkedUser::Phone(v) | LinkedUser::UserId(v) => v,
        }
    }

    pub(crate) fn validated(self) -> Result<Self> {
        if self.value().trim().is_empty() {
            return Err(Error::Configuration(format!(
                "Linked user {} is empty",
                self.scheme()
            )));
        }
        Ok(self)
    }
}

impl fmt::Display for LinkedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme(), self.value())
    }
}

/// Resolve the canonical locator string for a wallet.
///
/// Exactly one of `address` and `linked_user` must be given. The wallet type
/// suffix only applies to linked-user locators.
pub fn resolve(
    address: Option<&str>,
    linked_user: Option<&LinkedUser>,
    wallet_type: Option<WalletType>,
) -> Result<String> {
    match (address, linked_user) {
        (Some(address), None) => {
            if address.trim().is_empty() {
                return Err(Error::Configuration("Wallet address is empty".into()));
            }
            Ok(address.to_string())
        }
        (None, Some(user)) => {
            let user = user.clone().validated()?;
            Ok(match wallet_type {
                Some(t) => format!("{}:{}", user, t),
                None => user.to_string(),
            })
        }
        (None, None) => Err(Error::Configuration(
            "A wallet address or linked user is required".into(),
        )),
        (Some(_), Some(_)) => Err(Error::Configuration(
            "Provide either a wallet address or a linked user, not both".into(),
        )),
    }
}

/// A resolved wallet address paired with its type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletLocator {
    locator: String,
    wallet_type: WalletType,
}

impl WalletLocator {
    /// Locator for a wallet known by address
    pub fn from_address(address: &str, wallet_type: WalletType) -> Result<Self> {
        Ok(Self {
            locator: resolve(Some(address), None, Some(wallet_type))?,
            wallet_type,
        })
    }

    /// Locator for a wallet known by its linked user
    pub fn from_linked_user(user: &LinkedUser, wallet_type: WalletType) -> Result<Self> {
        Ok(Self {
            locator: resolve(None, Some(user), Some(wallet_type))?,
            wallet_type,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.locator
    }

    pub fn wallet_type(&self) -> WalletType {
        self.wallet_type
    }

    pub fn family(&self) -> ChainFamily {
        self.wallet_type.family()
    }
}

impl fmt::Display for WalletLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.locator)
    }
}
