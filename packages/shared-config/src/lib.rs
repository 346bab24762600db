//! Shared configuration types for qline clients
//!
//! This crate provides the configuration consumed by the queue REST client
//! and the status engine, ensuring both read the same environment.

mod api;
mod error;
mod session;

pub use api::ApiConfig;
pub use error::{ConfigError, ConfigResult};
pub use session::SessionConfig;

use std::env;

/// Common configuration shared between all qline components
#[derive(Debug, Clone)]
pub struct CommonConfig {
    /// Queue service REST configuration
    pub api: ApiConfig,

    /// Client-side session persistence configuration
    pub session: SessionConfig,

    /// Deployment, read from `ENVIRONMENT`
    pub environment: Environment,

    /// Log level (from RUST_LOG or LOG_LEVEL)
    pub log_level: String,
}

/// Deployment the client runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }

    /// Log filter used when `RUST_LOG` is unset
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Self::Production => "qline=info,qline_status=info,qline_queue_client=warn",
            _ => "qline=debug,qline_status=debug,qline_queue_client=debug",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        })
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CommonConfig {
    /// Load common configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            api: ApiConfig::from_env()?,
            session: SessionConfig::from_env()?,
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse()
                .unwrap_or_default(),
            log_level: env::var("RUST_LOG")
                .or_else(|_| env::var("LOG_LEVEL"))
                .unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Load a `.env` file (if any) and then read the environment
    pub fn load() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }
}

/// Helper function to get a required environment variable
pub fn get_required_env(name: &str) -> ConfigResult<String> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

/// Helper function to get an optional environment variable with a default
pub fn get_env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Helper function to parse an environment variable into a specific type
pub fn parse_env<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            "production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "prod".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "stage".parse::<Environment>().unwrap(),
            Environment::Staging
        );
        assert_eq!(
            "anything".parse::<Environment>().unwrap(),
            Environment::Development
        );
    }

    #[test]
    fn test_production_logs_less() {
        assert!(Environment::Production
            .default_log_filter()
            .contains("qline_status=info"));
        assert!(Environment::Development
            .default_log_filter()
            .contains("qline_status=debug"));
        assert_eq!(Environment::Staging.to_string(), "staging");
    }

    #[test]
    fn test_common_config_from_env() {
        temp_env::with_vars(
            [
                ("QUEUE_API_BASE_URL", Some("https://queue.example.com/api")),
                ("ENVIRONMENT", Some("prod")),
                ("RUST_LOG", Some("qline_status=trace")),
            ],
            || {
                let config = CommonConfig::from_env().unwrap();
                assert_eq!(config.api.base_url, "https://queue.example.com/api");
                assert!(config.environment.is_production());
                assert_eq!(config.log_level, "qline_status=trace");
            },
        );
    }

    #[test]
    fn test_common_config_requires_base_url() {
        temp_env::with_var_unset("QUEUE_API_BASE_URL", || {
            let result = CommonConfig::from_env();
            assert!(matches!(result, Err(ConfigError::MissingEnvVar(name)) if name == "QUEUE_API_BASE_URL"));
        });
    }

    #[test]
    fn test_parse_env_invalid_value() {
        temp_env::with_var("QLINE_TEST_NUMBER", Some("not-a-number"), || {
            let result: ConfigResult<u64> = parse_env("QLINE_TEST_NUMBER", 3);
            assert!(matches!(result, Err(ConfigError::InvalidValue(..))));
        });
    }
}
