//! Session identity persistence
//!
//! The session token is the only state shared between components. It is
//! read through a [`SessionStore`] injected into every component that issues
//! network calls, and written only by the access bootstrap, the join
//! workflow, and the ticket subscription's invalidation path.

mod cookie;
mod file;
mod memory;

use std::fmt;
use std::time::Duration;

use crate::error::StatusResult;

pub use cookie::SessionCookie;
pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

/// Cookie key the token is stored under
pub const SESSION_COOKIE_NAME: &str = "sessionId";

/// Opaque token identifying an anonymous queue session
///
/// Sent to the queue service as `qrId`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a raw token; blank input is not a token
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return None;
        }
        Some(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

/// Client-persisted, expiring storage for the session token
///
/// `read` fails soft: a missing, expired or malformed entry reads as `None`.
pub trait SessionStore: Send + Sync {
    /// Current token, if one is stored and unexpired
    fn read(&self) -> Option<SessionToken>;

    /// Persist `token` for `ttl`
    fn write(&self, token: &SessionToken, ttl: Duration) -> StatusResult<()>;

    /// Delete the token immediately (max-age zero)
    fn clear(&self) -> StatusResult<()>;
}
