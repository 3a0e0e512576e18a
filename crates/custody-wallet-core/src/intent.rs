//! Intents and the request bodies they become
//!
//! An intent is what the caller wants done; the custody service turns it
//! into a transaction or signature request that must collect approvals.

use crate::{ApprovalSubmission, Chain, ChainFamily, Error, RequestKind, Result, SignerRef};
use serde::{Deserialize, Serialize};

/// One call in an EVM batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmCall {
    /// Target address
    pub to: String,
    /// Value in wei, decimal string
    #[serde(default = "zero_value")]
    pub value: String,
    /// `0x`-hex calldata
    #[serde(default = "empty_data")]
    pub data: String,
}

fn zero_value() -> String {
    "0".to_string()
}

fn empty_data() -> String {
    "0x".to_string()
}

impl EvmCall {
    pub fn new(to: impl Into<String>, value: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            value: value.into(),
            data: data.into(),
        }
    }

    /// Plain native-token transfer
    pub fn transfer(to: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(to, value, empty_data())
    }

    /// Check address, value and calldata syntax
    pub fn validate(&self) -> Result<()> {
        #[cfg(feature = "evm")]
        {
            use alloy_primitives::{Address, U256};
            use std::str::FromStr;

            Address::from_str(&self.to)
                .map_err(|e| Error::Configuration(format!("Invalid call target {}: {}", self.to, e)))?;
            U256::from_str_radix(&self.value, 10).map_err(|e| {
                Error::Configuration(format!("Invalid call value {}: {}", self.value, e))
            })?;
        }

        let data = self.data.strip_prefix("0x").unwrap_or(&self.data);
        hex::decode(data)
            .map_err(|e| Error::Configuration(format!("Invalid calldata: {}", e)))?;
        Ok(())
    }
}

/// What the request carries
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// EVM call batch, executed atomically by the wallet
    Calls(Vec<EvmCall>),
    /// Base58 serialized Solana transaction
    SerializedTransaction(String),
    /// Plain message to sign
    Message(String),
    /// EIP-712 typed data to sign
    TypedData(serde_json::Value),
}

/// A transaction or signature the caller wants the wallet to produce
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub chain: Chain,
    pub payload: Payload,
    /// Signer expected to approve, when not the admin signer
    pub signer: Option<SignerRef>,
    /// Every signer whose approval the request needs
    pub required_signers: Vec<SignerRef>,
    /// Signatures computed elsewhere, keyed by signer
    pub external_approvals: Vec<ApprovalSubmission>,
}

impl Intent {
    pub fn new(chain: Chain, payload: Payload) -> Self {
        Self {
            chain,
            payload,
            signer: None,
            required_signers: Vec::new(),
            external_approvals: Vec::new(),
        }
    }

    pub fn calls(chain: Chain, calls: Vec<EvmCall>) -> Self {
        Self::new(chain, Payload::Calls(calls))
    }

    pub fn solana_transaction(serialized: impl Into<String>) -> Self {
        Self::new(Chain::Solana, Payload::SerializedTransaction(serialized.into()))
    }

    pub fn message(chain: Chain, message: impl Into<String>) -> Self {
        Self::new(chain, Payload::Message(message.into()))
    }

    pub fn typed_data(chain: Chain, typed_data: serde_json::Value) -> Self {
        Self::new(chain, Payload::TypedData(typed_data))
    }

    pub fn with_signer(mut self, signer: impl Into<SignerRef>) -> Self {
        self.signer = Some(signer.into());
        self
    }

    pub fn with_required_signers(mut self, signers: Vec<SignerRef>) -> Self {
        self.required_signers = signers;
        self
    }

    pub fn with_external_approval(mut self, approval: ApprovalSubmission) -> Self {
        self.external_approvals.push(approval);
        self
    }

    /// Sub-resource the intent is created under
    pub fn kind(&self) -> RequestKind {
        match self.payload {
            Payload::Calls(_) | Payload::SerializedTransaction(_) => RequestKind::Transaction,
            Payload::Message(_) | Payload::TypedData(_) => RequestKind::Signature,
        }
    }

    /// Check the intent against the family of the wallet it targets
    pub fn validate(&self, family: ChainFamily) -> Result<()> {
        if self.chain.family() != family {
            return Err(Error::Configuration(format!(
                "Chain {} is not an {} chain",
                self.chain, family
            )));
        }

        match (&self.payload, family) {
            (Payload::Calls(calls), ChainFamily::Evm) => {
                if calls.is_empty() {
                    return Err(Error::Configuration("Call batch is empty".into()));
                }
                calls.iter().try_for_each(EvmCall::validate)
            }
            (Payload::SerializedTransaction(tx), ChainFamily::Solana) => {
                let bytes = bs58::decode(tx).into_vec().map_err(|e| {
                    Error::Configuration(format!("Transaction is not base58: {}", e))
                })?;
                if bytes.is_empty() {
                    return Err(Error::Configuration("Serialized transaction is empty".into()));
                }
                Ok(())
            }
            (Payload::Message(_), ChainFamily::Evm) => Ok(()),
            (Payload::TypedData(data), ChainFamily::Evm) => {
                if data.get("domain").is_none() || data.get("types").is_none() {
                    return Err(Error::Configuration(
                        "Typed data needs `domain` and `types`".into(),
                    ));
                }
                Ok(())
            }
            (Payload::Message(_), ChainFamily::Solana) => Err(Error::UnsupportedOperation(
                "message signing is not available for Solana smart wallets".into(),
            )),
            (payload, family) => Err(Error::Configuration(format!(
                "{} payload is not valid for {} wallets",
                payload.name(),
                family
            ))),
        }
    }

    /// Wire body for the create call
    pub fn to_body(&self) -> CreateRequestBody {
        let mut params = RequestParams {
            signer: self.signer.clone(),
            required_signers: (!self.required_signers.is_empty())
                .then(|| self.required_signers.clone()),
            ..RequestParams::default()
        };
        let mut signature_type = None;

        match &self.payload {
            Payload::Calls(calls) => {
                params.calls = Some(calls.clone());
                params.chain = Some(self.chain);
            }
            Payload::SerializedTransaction(tx) => {
                params.transaction = Some(tx.clone());
            }
            Payload::Message(message) => {
                params.message = Some(message.clone());
                params.chain = Some(self.chain);
                signature_type = Some(SignatureType::EvmMessage);
            }
            Payload::TypedData(data) => {
                params.typed_data = Some(data.clone());
                params.chain = Some(self.chain);
                signature_type = Some(SignatureType::EvmTypedData);
            }
        }

        CreateRequestBody {
            signature_type,
            params,
        }
    }
}

impl Payload {
    fn name(&self) -> &'static str {
        match self {
            Payload::Calls(_) => "EVM call batch",
            Payload::SerializedTransaction(_) => "Serialized transaction",
            Payload::Message(_) => "Message",
            Payload::TypedData(_) => "Typed data",
        }
    }
}

/// Kind of signature request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureType {
    EvmMessage,
    EvmTypedData,
}

/// Parameters of a create call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calls: Option<Vec<EvmCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typed_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<Chain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<SignerRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_signers: Option<Vec<SignerRef>>,
}

/// Body of `POST /wallets/{locator}/transactions` and `.../signatures`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequestBody {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub signature_type: Option<SignatureType>,
    pub params: RequestParams,
}
