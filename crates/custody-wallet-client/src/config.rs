//! Client configuration

use crate::{ClientError, Result};
use secrecy::SecretString;
use std::time::Duration;

/// Environment variable holding the API base URL
pub const ENV_API_URL: &str = "CUSTODY_API_URL";
/// Environment variable holding the API key
pub const ENV_API_KEY: &str = "CUSTODY_API_KEY";
/// Environment variable holding the request timeout in seconds
pub const ENV_TIMEOUT_SECS: &str = "CUSTODY_TIMEOUT_SECS";

/// Connection settings for the custody API
#[derive(Debug)]
pub struct ClientConfig {
    /// Base URL, e.g. `https://custody.example.com/api/v1`
    pub base_url: String,
    /// Sent as `X-API-KEY` on every call
    pub api_key: SecretString,
    /// Per-call timeout
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: SecretString::from(api_key.into()),
            timeout: Self::DEFAULT_TIMEOUT,
            user_agent: format!("custody-wallet/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Read `CUSTODY_API_URL`, `CUSTODY_API_KEY` and the optional
    /// `CUSTODY_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var(ENV_API_URL).map_err(|_| ClientError::MissingEnv(ENV_API_URL))?;
        let api_key =
            std::env::var(ENV_API_KEY).map_err(|_| ClientError::MissingEnv(ENV_API_KEY))?;

        let mut config = Self::new(base_url, api_key);
        if let Ok(secs) = std::env::var(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ClientError::InvalidConfig(format!("{} must be whole seconds, got {}", ENV_TIMEOUT_SECS, secs))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Base URL without trailing slashes
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.base();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ClientError::InvalidConfig(format!(
                "Base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(ClientError::InvalidConfig("Timeout must be non-zero".into()));
        }
        Ok(())
    }
}
