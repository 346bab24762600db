//! Client-side session persistence configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::{get_env_or_default, parse_env, ConfigError, ConfigResult};

/// Seven days, the lifetime of a join-issued session
const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60 * 24 * 7;

/// One day, the lifetime of an access-bootstrap session
const DEFAULT_ACCESS_SESSION_TTL_SECS: u64 = 60 * 60 * 24;

/// Upper bound browsers apply to cookie lifetimes (400 days)
const MAX_SESSION_TTL_SECS: u64 = 60 * 60 * 24 * 400;

/// Session cookie configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cookie file used by the file-backed session store
    pub cookie_file: PathBuf,

    /// Max-age of a session token issued by joining a queue
    pub session_ttl_secs: u64,

    /// Max-age of a session token issued by the access exchange
    pub access_session_ttl_secs: u64,
}

impl SessionConfig {
    /// Load session configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let config = Self {
            cookie_file: PathBuf::from(get_env_or_default(
                "QLINE_SESSION_FILE",
                ".qline/session.cookie",
            )),
            session_ttl_secs: parse_env("QLINE_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            access_session_ttl_secs: parse_env(
                "QLINE_ACCESS_SESSION_TTL_SECS",
                DEFAULT_ACCESS_SESSION_TTL_SECS,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration with a custom cookie file (useful for testing)
    pub fn with_cookie_file(path: impl Into<PathBuf>) -> Self {
        Self {
            cookie_file: path.into(),
            ..Self::default()
        }
    }

    /// TTL applied when the join operation issues a token
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// TTL applied when the access exchange issues a token
    pub fn access_session_ttl(&self) -> Duration {
        Duration::from_secs(self.access_session_ttl_secs)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.session_ttl_secs == 0 || self.access_session_ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "session TTLs must be greater than zero".to_string(),
            ));
        }
        if self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::ValidationError(format!(
                "QLINE_SESSION_TTL_SECS cannot exceed {} seconds",
                MAX_SESSION_TTL_SECS
            )));
        }
        if self.access_session_ttl_secs > DEFAULT_ACCESS_SESSION_TTL_SECS {
            return Err(ConfigError::ValidationError(format!(
                "QLINE_ACCESS_SESSION_TTL_SECS cannot exceed {} seconds",
                DEFAULT_ACCESS_SESSION_TTL_SECS
            )));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_file: PathBuf::from(".qline/session.cookie"),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            access_session_ttl_secs: DEFAULT_ACCESS_SESSION_TTL_SECS,
        }
    }
}
