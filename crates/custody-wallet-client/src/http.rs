//! Blocking HTTP implementation of [`CustodyTransport`]

use crate::{ClientConfig, Result};
use custody_wallet_core::delegated::{DelegatedSigner, RegisterSignerBody};
use custody_wallet_core::intent::CreateRequestBody;
use custody_wallet_core::transport::TransportResult;
use custody_wallet_core::wallet::{BalanceQuery, CreateWalletBody, TokenBalance, WalletInfo};
use custody_wallet_core::{
    ApprovalSubmission, CustodyTransport, RemoteRequest, RequestKind, SignerRef, TransportError,
};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Custody API client over `reqwest`'s blocking client
#[derive(Debug)]
pub struct HttpTransport {
    base: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut key = HeaderValue::from_str(config.api_key.expose_secret()).map_err(|_| {
            crate::ClientError::InvalidConfig("API key is not a valid header value".into())
        })?;
        key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base: config.base().to_string(),
            client,
        })
    }

    /// Client configured from the environment, see [`ClientConfig::from_env`]
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// URL of `segments` under the base URL; each segment is percent-encoded
    pub fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> TransportResult<R> {
        let response = request.send().map_err(classify)?;
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().map_err(classify)?;
        debug!(url = %url, status = status.as_u16(), "Custody API response");

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound(url));
        }
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                message: body,
            });
        }
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(format!("{}: {}", url, e)))
    }

    fn request_url(&self, locator: &str, kind: RequestKind, rest: &[&str]) -> String {
        let mut segments = vec!["wallets", locator, kind.path_segment()];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_decode() {
        TransportError::Decode(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

impl CustodyTransport for HttpTransport {
    fn create_wallet(&self, body: &CreateWalletBody) -> TransportResult<WalletInfo> {
        self.send(self.client.post(self.url(&["wallets"])).json(body))
    }

    fn get_wallet(&self, locator: &str) -> TransportResult<WalletInfo> {
        self.send(self.client.get(self.url(&["wallets", locator])))
    }

    fn create_request(
        &self,
        locator: &str,
        kind: RequestKind,
        body: &CreateRequestBody,
    ) -> TransportResult<RemoteRequest> {
        let url = self.request_url(locator, kind, &[]);
        self.send(self.client.post(url).json(body))
    }

    fn get_request(
        &self,
        locator: &str,
        kind: RequestKind,
        id: &str,
    ) -> TransportResult<RemoteRequest> {
        let url = self.request_url(locator, kind, &[id]);
        self.send(self.client.get(url))
    }

    fn approve_request(
        &self,
        locator: &str,
        kind: RequestKind,
        id: &str,
        approvals: &[ApprovalSubmission],
    ) -> TransportResult<RemoteRequest> {
        let url = self.request_url(locator, kind, &[id, "approvals"]);
        let body = serde_json::json!({ "approvals": approvals });
        self.send(self.client.post(url).json(&body))
    }

    fn register_signer(
        &self,
        locator: &str,
        body: &RegisterSignerBody,
    ) -> TransportResult<DelegatedSigner> {
        let url = self.url(&["wallets", locator, "signers"]);
        self.send(self.client.post(url).json(body))
    }

    fn get_signer(
        &self,
        locator: &str,
        signer: &SignerRef,
    ) -> TransportResult<Option<DelegatedSigner>> {
        let url = self.url(&["wallets", locator, "signers", signer.as_str()]);
        match self.send(self.client.get(url)) {
            Ok(found) => Ok(Some(found)),
            Err(TransportError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn get_balances(
        &self,
        locator: &str,
        query: &BalanceQuery,
    ) -> TransportResult<Vec<TokenBalance>> {
        let url = self.url(&["wallets", locator, "balances"]);
        self.send(self.client.get(url).query(&query.query_pairs()))
    }
}
