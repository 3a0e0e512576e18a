//! Delegated signer registry
//!
//! Registration and lookup are pass-throughs to the custody service. The
//! only client-side rule is expiry: a signer whose `expiresAt` has passed is
//! treated as absent, decided from the record already fetched.

use crate::transport::CustodyTransport;
use crate::{Chain, Error, Result, SignerRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Scoped permission attached to a delegated signer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: serde_json::Value,
}

impl Permission {
    pub fn new(kind: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            value,
        }
    }
}

/// Additional signer authorized on a wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedSigner {
    pub signer: SignerRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<Chain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,
}

impl DelegatedSigner {
    /// Check if the signer has expired as of `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Check if the signer is still valid right now
    pub fn is_active(&self) -> bool {
        !self.is_expired_at(Utc::now())
    }
}

/// Body of `POST /wallets/{locator}/signers`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSignerBody {
    pub signer: SignerRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<Chain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,
}

/// Outcome of checking a set of signers against a wallet
#[derive(Debug, Clone, Default)]
pub struct SignerCheck {
    /// Registered and unexpired
    pub active: Vec<DelegatedSigner>,
    /// Never registered, or expired
    pub absent: Vec<SignerRef>,
}

impl SignerCheck {
    pub fn all_active(&self) -> bool {
        self.absent.is_empty()
    }
}

/// Registers and queries delegated signers for wallets
pub struct DelegatedSignerRegistry<'a, T: CustodyTransport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: CustodyTransport + ?Sized> DelegatedSignerRegistry<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Register `signer` on the wallet at `locator`
    pub fn register(
        &self,
        locator: &str,
        signer: SignerRef,
        chain: Option<Chain>,
        expires_at: Option<DateTime<Utc>>,
        permissions: Vec<Permission>,
    ) -> Result<DelegatedSigner> {
        if expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(Error::Configuration(format!(
                "Expiry for {} is already in the past",
                signer
            )));
        }

        let body = RegisterSignerBody {
            signer,
            chain,
            expires_at,
            permissions,
        };
        let registered = self
            .transport
            .register_signer(locator, &body)
            .map_err(|source| Error::Submission {
                id: None,
                stage: "register signer",
                source,
            })?;

        info!(
            locator,
            signer = %registered.signer,
            expires_at = ?registered.expires_at,
            "Delegated signer registered"
        );
        Ok(registered)
    }

    /// Look up `signer`; expired registrations come back as `None`
    pub fn get(&self, locator: &str, signer: &SignerRef) -> Result<Option<DelegatedSigner>> {
        let found = self.fetch(locator, signer)?;
        Ok(found.filter(DelegatedSigner::is_active))
    }

    /// Check several signers, fetching each distinct one at most once
    pub fn check(&self, locator: &str, signers: &[SignerRef]) -> Result<SignerCheck> {
        let mut fetched: HashMap<&SignerRef, Option<DelegatedSigner>> = HashMap::new();
        let mut check = SignerCheck::default();
        let now = Utc::now();

        for signer in signers {
            if !fetched.contains_key(signer) {
                let record = self.fetch(locator, signer)?;
                fetched.insert(signer, record);
            }

            match fetched.get(signer).and_then(Option::as_ref) {
                Some(record) if !record.is_expired_at(now) => check.active.push(record.clone()),
                Some(record) => {
                    debug!(locator, signer = %record.signer, "Delegated signer expired");
                    check.absent.push(signer.clone());
                }
                None => check.absent.push(signer.clone()),
            }
        }

        Ok(check)
    }

    fn fetch(&self, locator: &str, signer: &SignerRef) -> Result<Option<DelegatedSigner>> {
        self.transport
            .get_signer(locator, signer)
            .map_err(|source| Error::Submission {
                id: None,
                stage: "signer lookup",
                source,
            })
    }
}
