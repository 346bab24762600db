//! Configuration error types

use thiserror::Error;

/// Errors raised while reading qline configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A variable the client cannot run without is not set
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// A variable is set but cannot be parsed
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    /// The queue service base URL is not an absolute http(s) URL
    #[error("invalid URL for {name}: {reason}")]
    InvalidUrl { name: String, reason: String },

    /// Values parse individually but contradict each other
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
