//! Access-credential bootstrap
//!
//! The access page receives a one-time credential (`initialQrId`) in its
//! URL and trades it for a session token exactly once per mount.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use qline_queue_client::{AccessGrant, QueueApiResult, QueueClient};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::navigation::{Navigator, Route};
use crate::session::{SessionStore, SessionToken};

/// Query parameter carrying the one-time credential
pub const ACCESS_CREDENTIAL_PARAM: &str = "initialQrId";

/// Where a bootstrap attempt stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapState {
    Idle,
    Exchanging,
    /// Token stored, visitor sent to the service-provided destination
    Redirected(Route),
    /// Credential missing or rejected; terminal
    Unauthorized,
    /// Transport or server failure; the visitor must reload to retry
    Failed(String),
}

/// Exchanges an access credential for a session token
pub struct SessionBootstrap {
    client: QueueClient,
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    ttl: Duration,
    state: Arc<watch::Sender<BootstrapState>>,
    attempt: Arc<Mutex<u64>>,
    credential: Option<String>,
    in_flight: Option<JoinHandle<()>>,
}

impl SessionBootstrap {
    pub fn new(
        client: QueueClient,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
        ttl: Duration,
    ) -> Self {
        let (state, _) = watch::channel(BootstrapState::Idle);
        Self {
            client,
            store,
            navigator,
            ttl,
            state: Arc::new(state),
            attempt: Arc::new(Mutex::new(0)),
            credential: None,
            in_flight: None,
        }
    }

    /// Extract the credential from an entry URL (absolute or path-only)
    pub fn credential_from_url(entry_url: &str) -> Option<String> {
        let base = Url::parse("http://localhost/").ok()?;
        let url = base.join(entry_url).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == ACCESS_CREDENTIAL_PARAM)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub fn state(&self) -> BootstrapState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BootstrapState> {
        self.state.subscribe()
    }

    /// Wait until the current attempt leaves `Exchanging`
    pub async fn settled(&self) -> BootstrapState {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|state| *state != BootstrapState::Exchanging)
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Start (or restart) the bootstrap for `credential`
    ///
    /// Mounting again with the same credential is a no-op. A different
    /// credential supersedes the in-flight exchange: it is aborted and its
    /// result, should it still arrive, is never applied.
    pub fn mount(&mut self, credential: Option<&str>) {
        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        if self.credential == credential && self.state() != BootstrapState::Idle {
            return;
        }

        let attempt = self.supersede();
        self.credential = credential.clone();

        let Some(credential) = credential else {
            info!("No access credential; session refused");
            self.state.send_replace(BootstrapState::Unauthorized);
            self.navigator.navigate(Route::Unauthorized);
            return;
        };

        self.state.send_replace(BootstrapState::Exchanging);

        let client = self.client.clone();
        let context = ApplyContext {
            store: self.store.clone(),
            navigator: self.navigator.clone(),
            ttl: self.ttl,
            state: self.state.clone(),
            attempt: self.attempt.clone(),
            mine: attempt,
        };
        self.in_flight = Some(tokio::spawn(async move {
            let result = client.exchange_access(&credential).await;
            context.apply(result);
        }));
    }

    /// Tear down: abort any in-flight exchange and discard its result
    pub fn unmount(&mut self) {
        self.supersede();
        self.credential = None;
        self.state.send_replace(BootstrapState::Idle);
    }

    fn supersede(&mut self) -> u64 {
        let mut attempt = self.attempt.lock().unwrap_or_else(|e| e.into_inner());
        *attempt += 1;
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        *attempt
    }
}

impl Drop for SessionBootstrap {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

struct ApplyContext {
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    ttl: Duration,
    state: Arc<watch::Sender<BootstrapState>>,
    attempt: Arc<Mutex<u64>>,
    mine: u64,
}

impl ApplyContext {
    fn apply(self, result: QueueApiResult<AccessGrant>) {
        // Held while applying so a concurrent mount cannot interleave.
        let current = self.attempt.lock().unwrap_or_else(|e| e.into_inner());
        if *current != self.mine {
            debug!(attempt = self.mine, current = *current, "Discarding stale access exchange");
            return;
        }

        let next = match result {
            Ok(grant) => self.grant(grant),
            Err(e) if e.is_unauthorized() => {
                info!("Access credential rejected");
                self.navigator.navigate(Route::Unauthorized);
                BootstrapState::Unauthorized
            }
            Err(e) => {
                warn!(error = %e, "Access exchange failed");
                BootstrapState::Failed(e.user_message())
            }
        };
        self.state.send_replace(next);
    }

    fn grant(&self, grant: AccessGrant) -> BootstrapState {
        let Some(token) = SessionToken::new(grant.session_id) else {
            warn!("Access exchange returned an empty session id");
            return BootstrapState::Failed("The queue service returned no session.".to_string());
        };

        if let Err(e) = self.store.write(&token, self.ttl) {
            warn!(error = %e, "Could not persist session token");
            return BootstrapState::Failed(e.user_message());
        }

        let route = Route::from_path(&grant.path);
        info!(path = route.path(), "Session established from access credential");
        self.navigator.navigate(route.clone());
        BootstrapState::Redirected(route)
    }
}
