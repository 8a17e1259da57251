use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.revenuecat.com/v1/";

/// Calls to the API may wait on the app stores, so the default is generous.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const ENV_API_KEY: &str = "REVENUECAT_API_KEY";
pub const ENV_API_URL: &str = "REVENUECAT_API_URL";
pub const ENV_SANDBOX: &str = "REVENUECAT_SANDBOX";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("REVENUECAT_API_KEY is not set")]
    MissingApiKey,
    #[error("REVENUECAT_SANDBOX must be a boolean, got {0:?}")]
    InvalidSandbox(String),
}

/// Client configuration. Read-only once handed to a `Client`.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Secret key sent as the bearer credential.
    pub api_key: String,
    /// Prefix every path suffix is appended to. Keep the trailing slash.
    pub base_url: String,
    /// Adds `X-Is-Sandbox: true` to every request when set.
    pub sandbox: bool,
    /// Round-trip bound applied by the production executor.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            sandbox: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read configuration from `REVENUECAT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key);

        if let Some(url) = lookup(ENV_API_URL).filter(|url| !url.trim().is_empty()) {
            config.base_url = url;
        }
        if let Some(raw) = lookup(ENV_SANDBOX) {
            config.sandbox = parse_bool(&raw).ok_or(ConfigError::InvalidSandbox(raw))?;
        }
        Ok(config)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("sandbox", &self.sandbox)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}
