//! Queue service REST configuration

use url::Url;

use crate::{get_required_env, parse_env, ConfigError, ConfigResult};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Queue service REST API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Retry attempts for idempotent lookups (0 disables retries)
    pub max_retries: u32,
}

impl ApiConfig {
    /// Load API configuration from environment variables
    ///
    /// `QUEUE_API_BASE_URL` is required and must be an absolute http(s) URL.
    pub fn from_env() -> ConfigResult<Self> {
        let base_url = get_required_env("QUEUE_API_BASE_URL")?;
        Self::validate_base_url("QUEUE_API_BASE_URL", &base_url)?;

        let config = Self {
            base_url,
            timeout_secs: parse_env("QUEUE_API_TIMEOUT", DEFAULT_TIMEOUT_SECS)?,
            connect_timeout_secs: parse_env(
                "QUEUE_API_CONNECT_TIMEOUT",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
            max_retries: parse_env("QUEUE_API_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
        };

        if config.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "QUEUE_API_TIMEOUT must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }

    /// Create a configuration with a custom URL (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            base_url: url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Override the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Join an endpoint path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn validate_base_url(name: &str, value: &str) -> ConfigResult<()> {
        let parsed = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ConfigError::InvalidUrl {
                name: name.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            }),
        }
    }
}
