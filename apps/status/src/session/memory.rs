//! In-memory session store
//!
//! Expiry is tracked with `Instant`, so an entry written with a TTL simply
//! stops reading after it elapses. Poisoned locks are recovered.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

use super::{SessionStore, SessionToken};
use crate::error::{StatusError, StatusResult};

/// Session store kept in process memory
///
/// Clones share the same entry. Every write and clear is recorded, which
/// lets callers assert exactly which TTL a component used.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    entry: Option<MemoryEntry>,
    writes: Vec<Duration>,
    clears: usize,
}

struct MemoryEntry {
    token: SessionToken,
    expires_at: Instant,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `token` for seven days
    pub fn with_token(token: &str) -> Self {
        let store = Self::new();
        if let Some(token) = SessionToken::new(token) {
            let mut state = store.inner.write().unwrap_or_else(|e| e.into_inner());
            state.entry = Some(MemoryEntry {
                token,
                expires_at: Instant::now() + Duration::from_secs(60 * 60 * 24 * 7),
            });
        }
        store
    }

    /// TTLs passed to `write`, oldest first
    pub fn writes(&self) -> Vec<Duration> {
        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        state.writes.clone()
    }

    /// Number of times `clear` was called
    pub fn clear_count(&self) -> usize {
        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        state.clears
    }
}

impl SessionStore for MemorySessionStore {
    fn read(&self) -> Option<SessionToken> {
        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        state
            .entry
            .as_ref()
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.token.clone())
    }

    fn write(&self, token: &SessionToken, ttl: Duration) -> StatusResult<()> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or(StatusError::SessionTtl(ttl.as_secs()))?;
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        state.entry = Some(MemoryEntry {
            token: token.clone(),
            expires_at,
        });
        state.writes.push(ttl);
        debug!(ttl_secs = ttl.as_secs(), "Session token stored in memory");
        Ok(())
    }

    fn clear(&self) -> StatusResult<()> {
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        state.entry = None;
        state.clears += 1;
        Ok(())
    }
}
