use std::sync::Arc;
use std::time::Duration;

use qline_queue_client::QueueClient;
use qline_shared_config::ApiConfig;
use qline_status::{
    MemoryLiveStream, MemorySessionStore, RecordingNavigator, StatusController, StatusDeps,
    StatusHandle, StatusView,
};
use qline_test_utils::{MockQueueServer, TicketFixture};

/// Session token the harness store starts with
pub const SESSION: &str = "sess-1";

/// Upper bound for any single view transition in a test
pub const VIEW_TIMEOUT: Duration = Duration::from_secs(5);

pub struct StatusHarness {
    pub server: MockQueueServer,
    pub stream: MemoryLiveStream,
    pub store: MemorySessionStore,
    pub navigator: RecordingNavigator,
}

impl StatusHarness {
    /// Harness whose store already holds [`SESSION`]
    pub async fn new() -> Self {
        Self::with_store(MemorySessionStore::with_token(SESSION)).await
    }

    /// Harness with an empty session store
    pub async fn without_session() -> Self {
        Self::with_store(MemorySessionStore::new()).await
    }

    async fn with_store(store: MemorySessionStore) -> Self {
        Self {
            server: MockQueueServer::start().await,
            stream: MemoryLiveStream::new(),
            store,
            navigator: RecordingNavigator::new(),
        }
    }

    /// Queue client pointed at the mock server, without retries
    pub fn client(&self) -> QueueClient {
        QueueClient::new(&ApiConfig::with_url(self.server.url()).with_max_retries(0))
            .expect("client builds")
    }

    pub fn deps(&self) -> StatusDeps {
        StatusDeps {
            client: self.client(),
            stream: Arc::new(self.stream.clone()),
            store: Arc::new(self.store.clone()),
            navigator: Arc::new(self.navigator.clone()),
        }
    }

    pub fn spawn(&self) -> StatusHandle {
        StatusController::spawn(self.deps())
    }

    /// Insert or replace a ticket document in the live collection
    pub fn push(&self, fixture: TicketFixture) {
        self.stream.upsert(&fixture.id, fixture.fields());
    }
}

/// Wait for a view matching `predicate`, failing the test after [`VIEW_TIMEOUT`]
pub async fn view_where(
    handle: &StatusHandle,
    predicate: impl FnMut(&StatusView) -> bool,
) -> StatusView {
    tokio::time::timeout(VIEW_TIMEOUT, handle.wait_until(predicate))
        .await
        .expect("view never reached the expected state")
}

/// Position of the displayed ticket, if any
pub fn position(view: &StatusView) -> Option<i64> {
    view.ticket.as_ref().map(|ticket| ticket.position)
}

/// Counter id of the displayed ticket, if any
pub fn counter_id(view: &StatusView) -> Option<&str> {
    view.ticket.as_ref()?.counter_id.as_deref()
}
