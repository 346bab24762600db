//! Queue service error types

use thiserror::Error;

/// Queue service client errors
#[derive(Error, Debug)]
pub enum QueueApiError {
    /// Invalid input provided to an API method; never sent to the network
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The service refused the credential or session (HTTP 403)
    #[error("Access denied by queue service: {0}")]
    Unauthorized(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse queue service response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The service answered with a non-success status
    #[error("Queue service error {status}: {message}")]
    Api { status: u16, message: String },

    /// Request timeout
    #[error("Request to queue service timed out")]
    Timeout,
}

impl QueueApiError {
    /// Check if this error is retryable (transient failure)
    ///
    /// Timeouts, connection failures and 5xx responses are transient;
    /// authorization and other 4xx responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            QueueApiError::Timeout => true,
            QueueApiError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                matches!(e.status(), Some(status) if status.is_server_error())
            }
            QueueApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the service rejected the session outright
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, QueueApiError::Unauthorized(_))
    }

    /// Text suitable for showing next to the control that failed
    ///
    /// Server-provided messages are shown verbatim; everything else falls
    /// back to the error's display form.
    pub fn user_message(&self) -> String {
        match self {
            QueueApiError::Api { message, .. } | QueueApiError::Unauthorized(message)
                if !message.is_empty() =>
            {
                message.clone()
            }
            QueueApiError::InvalidInput(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for queue service operations
pub type QueueApiResult<T> = Result<T, QueueApiError>;
