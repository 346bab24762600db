//! Error handling for the status engine
//!
//! Errors are caught by the component that issued the failing call and turned
//! into view state; [`StatusError::user_message`] is the text that ends up
//! next to the control that failed.

use qline_queue_client::QueueApiError;
use thiserror::Error;

/// Status engine error type
#[derive(Error, Debug)]
pub enum StatusError {
    /// A local precondition failed; nothing was sent to the network
    #[error("precondition failed: {0}")]
    MissingPrecondition(String),

    /// A request of the same kind is still in flight
    #[error("{0} already in progress")]
    InFlight(&'static str),

    /// A live document could not be turned into a ticket
    #[error("ticket {ticket_id} failed integrity check: {reason}")]
    DataIntegrity { ticket_id: String, reason: String },

    /// The live stream reported a failure
    #[error("live stream error: {0}")]
    Stream(String),

    /// A queue service call failed
    #[error(transparent)]
    Api(#[from] QueueApiError),

    /// A session lifetime does not fit a cookie expiry date
    #[error("session lifetime of {0} seconds is out of range")]
    SessionTtl(u64),

    /// The session store could not be written
    #[error("session store error: {0}")]
    SessionStore(#[from] std::io::Error),
}

impl StatusError {
    /// Text suitable for showing to the visitor
    pub fn user_message(&self) -> String {
        match self {
            StatusError::MissingPrecondition(message) => message.clone(),
            StatusError::Stream(message) => message.clone(),
            StatusError::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    /// Whether the queue service rejected the session
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, StatusError::Api(e) if e.is_unauthorized())
    }
}

/// Result type for status engine operations
pub type StatusResult<T> = Result<T, StatusError>;
