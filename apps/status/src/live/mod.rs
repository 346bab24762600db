//! Live ticket stream abstraction
//!
//! The realtime provider is a publish/subscribe primitive with snapshot
//! semantics: every change to a matching document delivers the complete
//! current result set, never a delta. Subscribing returns a [`Subscription`]
//! handle; dropping or unsubscribing it detaches the listener.

mod memory;

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::ticket::TicketStatus;

pub use memory::MemoryLiveStream;

/// One document of the ticket collection
#[derive(Debug, Clone, PartialEq)]
pub struct TicketDocument {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl TicketDocument {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Full result set of a live query at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub documents: Vec<TicketDocument>,
}

impl Snapshot {
    pub fn new(documents: Vec<TicketDocument>) -> Self {
        Self { documents }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }
}

/// Failure reported by the provider on a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    pub message: String,
}

impl StreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Query predicates supported by the provider
///
/// Equality on the session-token field (`qrId`) and the station field, and
/// membership of `status` in a set. Unset predicates match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketFilter {
    pub session_id: Option<String>,
    pub station_id: Option<String>,
    pub statuses: Vec<TicketStatus>,
}

impl TicketFilter {
    /// Active (waiting or serving) tickets owned by one session
    pub fn active_for_session(session_id: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            station_id: None,
            statuses: TicketStatus::ACTIVE.to_vec(),
        }
    }

    /// Tickets currently being served at one station
    pub fn serving_at_station(station_id: &str) -> Self {
        Self {
            session_id: None,
            station_id: Some(station_id.to_string()),
            statuses: vec![TicketStatus::Serving],
        }
    }

    pub fn matches(&self, document: &TicketDocument) -> bool {
        if let Some(session_id) = &self.session_id {
            if document.str_field("qrId") != Some(session_id.as_str()) {
                return false;
            }
        }
        if let Some(station_id) = &self.station_id {
            if document.str_field("stationId") != Some(station_id.as_str()) {
                return false;
            }
        }
        if self.statuses.is_empty() {
            return true;
        }
        document
            .str_field("status")
            .map(|status| self.statuses.iter().any(|s| s.as_str() == status))
            .unwrap_or(false)
    }
}

/// Listener invoked with every delivered snapshot
pub type SnapshotListener = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// Listener invoked when the provider fails the subscription
pub type ErrorListener = Arc<dyn Fn(StreamError) + Send + Sync>;

/// Realtime ticket provider
pub trait LiveStream: Send + Sync {
    /// Open a live query; deliveries for one subscription arrive in order
    fn subscribe(
        &self,
        filter: TicketFilter,
        on_snapshot: SnapshotListener,
        on_error: ErrorListener,
    ) -> Subscription;
}

/// Handle to an open live query
///
/// Unsubscribes when dropped; [`Subscription::unsubscribe`] makes the
/// teardown point explicit.
#[must_use = "dropping a subscription unsubscribes it"]
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A handle with nothing to tear down
    pub fn detached() -> Self {
        Self { teardown: None }
    }

    pub fn unsubscribe(mut self) {
        self.run_teardown();
    }

    fn run_teardown(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_teardown();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qline_test_utils::TicketFixture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn document(fixture: TicketFixture) -> TicketDocument {
        TicketDocument::new(fixture.id.clone(), fixture.fields())
    }

    #[test]
    fn test_session_filter_matches_active_only() {
        let filter = TicketFilter::active_for_session("sess-1");
        assert!(filter.matches(&document(TicketFixture::waiting("t-1", "sess-1", "st-1"))));
        assert!(filter.matches(&document(TicketFixture::serving("t-1", "sess-1", "st-1", "c1"))));
        assert!(!filter.matches(&document(
            TicketFixture::waiting("t-1", "sess-1", "st-1").status("completed")
        )));
        assert!(!filter.matches(&document(TicketFixture::waiting("t-1", "sess-2", "st-1"))));
    }

    #[test]
    fn test_station_filter_matches_serving_only() {
        let filter = TicketFilter::serving_at_station("st-1");
        assert!(filter.matches(&document(TicketFixture::serving("t-1", "s", "st-1", "c1"))));
        assert!(!filter.matches(&document(TicketFixture::serving("t-1", "s", "st-2", "c1"))));
        assert!(!filter.matches(&document(TicketFixture::waiting("t-1", "s", "st-1"))));
    }

    #[test]
    fn test_subscription_tears_down_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        subscription.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_drop_tears_down() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        {
            let _subscription = Subscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
