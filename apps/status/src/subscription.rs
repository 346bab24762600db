//! Live subscription to the session's own ticket

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::StatusError;
use crate::events::EventSink;
use crate::live::{LiveStream, Snapshot, StreamError, Subscription, TicketFilter};
use crate::session::{SessionStore, SessionToken};
use crate::ticket::{Ticket, TicketStatus};

/// Delivery from the ticket query, tagged with the subscription generation
#[derive(Debug, Clone)]
pub enum TicketEvent {
    Snapshot { generation: u64, snapshot: Snapshot },
    Error { generation: u64, error: StreamError },
}

/// Outcome of applying one [`TicketEvent`]
#[derive(Debug)]
pub enum TicketUpdate {
    /// A new ticket state was materialized
    Updated {
        ticket: Ticket,
        /// Status just moved into `serving`
        serving_alert: bool,
        /// Matches beyond the first one
        extra_matches: usize,
    },
    /// No live ticket for the session; token cleared, subscription closed
    Invalidated,
    /// The first match could not be materialized; previous ticket kept
    Rejected(StatusError),
    /// The stream reported a failure; previous ticket kept
    Failed(StatusError),
    /// Stale or post-teardown delivery
    Ignored,
}

/// Owns the one live query for "my active ticket"
pub struct TicketSubscription {
    stream: Arc<dyn LiveStream>,
    store: Arc<dyn SessionStore>,
    generation: u64,
    active: Option<Subscription>,
    session: Option<SessionToken>,
    ticket: Option<Ticket>,
    // Survives re-subscription for the same session so an unchanged
    // `serving` does not re-alert.
    last_status: Option<TicketStatus>,
}

impl TicketSubscription {
    pub fn new(stream: Arc<dyn LiveStream>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            stream,
            store,
            generation: 0,
            active: None,
            session: None,
            ticket: None,
            last_status: None,
        }
    }

    pub fn ticket(&self) -> Option<&Ticket> {
        self.ticket.as_ref()
    }

    /// Session the current or last query was opened for
    pub fn session(&self) -> Option<&SessionToken> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Open the query for `token`, replacing any previous one
    ///
    /// A different session starts from scratch: the previous ticket and its
    /// last known status are forgotten.
    pub fn establish(&mut self, token: &SessionToken, sink: EventSink<TicketEvent>) -> u64 {
        self.teardown();
        if self.session.as_ref() != Some(token) {
            if self.session.is_some() {
                info!("Session changed; resetting ticket state");
            }
            self.session = Some(token.clone());
            self.ticket = None;
            self.last_status = None;
        }
        let generation = self.generation;

        let on_snapshot = sink.clone();
        let subscription = self.stream.subscribe(
            TicketFilter::active_for_session(token.as_str()),
            Arc::new(move |snapshot| {
                on_snapshot.post(TicketEvent::Snapshot {
                    generation,
                    snapshot,
                })
            }),
            Arc::new(move |error| sink.post(TicketEvent::Error { generation, error })),
        );
        self.active = Some(subscription);

        debug!(generation, "Ticket subscription established");
        generation
    }

    /// Close the query; anything it delivers afterwards is ignored
    pub fn teardown(&mut self) {
        self.generation += 1;
        if let Some(subscription) = self.active.take() {
            subscription.unsubscribe();
            debug!(generation = self.generation, "Ticket subscription closed");
        }
    }

    pub fn apply(&mut self, event: TicketEvent) -> TicketUpdate {
        match event {
            TicketEvent::Snapshot {
                generation,
                snapshot,
            } if self.is_current(generation) => self.apply_snapshot(snapshot),
            TicketEvent::Error { generation, error } if self.is_current(generation) => {
                warn!(error = %error, "Ticket stream failed");
                TicketUpdate::Failed(StatusError::Stream(error.message))
            }
            _ => {
                debug!("Ignoring stale ticket delivery");
                TicketUpdate::Ignored
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.active.is_some() && generation == self.generation
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) -> TicketUpdate {
        let Some(first) = snapshot.documents.first() else {
            info!("No active ticket for session; invalidating");
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "Could not clear session token");
            }
            self.teardown();
            self.ticket = None;
            return TicketUpdate::Invalidated;
        };

        let extra_matches = snapshot.len() - 1;
        if extra_matches > 0 {
            warn!(
                ticket_id = %first.id,
                extra_matches,
                "Session has more than one active ticket; using the first"
            );
        }

        let ticket = match Ticket::from_document(first) {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(error = %e, "Rejected ticket document");
                return TicketUpdate::Rejected(e);
            }
        };

        if let Some(previous) = self.last_status {
            if !previous.can_advance_to(ticket.status) {
                warn!(
                    ticket_id = %ticket.id,
                    from = previous.as_str(),
                    to = ticket.status.as_str(),
                    "Ticket status moved backwards"
                );
            }
        }

        let serving_alert =
            ticket.status == TicketStatus::Serving && self.last_status != Some(TicketStatus::Serving);
        self.last_status = Some(ticket.status);
        self.ticket = Some(ticket.clone());

        TicketUpdate::Updated {
            ticket,
            serving_alert,
            extra_matches,
        }
    }
}

impl Drop for TicketSubscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::MemoryLiveStream;
    use crate::session::MemorySessionStore;
    use assert_matches::assert_matches;
    use qline_test_utils::TicketFixture;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tracing_test::traced_test;

    struct Harness {
        stream: MemoryLiveStream,
        store: MemorySessionStore,
        subscription: TicketSubscription,
        events: UnboundedReceiver<TicketEvent>,
    }

    impl Harness {
        fn new(seed: Option<TicketFixture>) -> Self {
            let stream = MemoryLiveStream::new();
            if let Some(fixture) = seed {
                stream.upsert(&fixture.id, fixture.fields());
            }
            let store = MemorySessionStore::with_token("sess-1");
            let mut subscription =
                TicketSubscription::new(Arc::new(stream.clone()), Arc::new(store.clone()));
            let (sink, events) = EventSink::channel();
            let token = store.read().unwrap();
            subscription.establish(&token, sink);
            Self {
                stream,
                store,
                subscription,
                events,
            }
        }

        fn seeded(fixture: TicketFixture) -> Self {
            let mut harness = Self::new(Some(fixture));
            harness.drain();
            harness
        }

        fn push(&self, fixture: TicketFixture) {
            self.stream.upsert(&fixture.id, fixture.fields());
        }

        fn drain(&mut self) -> Vec<TicketUpdate> {
            let mut updates = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                updates.push(self.subscription.apply(event));
            }
            updates
        }
    }

    #[test]
    fn test_empty_first_delivery_invalidates_session() {
        let mut harness = Harness::new(None);
        let updates = harness.drain();

        assert_eq!(updates.len(), 1);
        assert_matches!(updates[0], TicketUpdate::Invalidated);
        assert!(harness.store.read().is_none());
        assert_eq!(harness.store.clear_count(), 1);
        assert!(!harness.subscription.is_active());
        assert_eq!(harness.stream.listener_count(), 0);
    }

    #[test]
    fn test_position_updates_then_serving_alert_once() {
        let mut harness = Harness::new(Some(
            TicketFixture::waiting("t-1", "sess-1", "st-1").position(5),
        ));
        harness.push(TicketFixture::waiting("t-1", "sess-1", "st-1").position(1));
        harness.push(TicketFixture::serving("t-1", "sess-1", "st-1", "c9"));
        harness.push(TicketFixture::serving("t-1", "sess-1", "st-1", "c9").position(0));

        let alerts: Vec<(i64, bool)> = harness
            .drain()
            .into_iter()
            .map(|update| match update {
                TicketUpdate::Updated {
                    ticket,
                    serving_alert,
                    ..
                } => (ticket.position, serving_alert),
                other => panic!("unexpected update {:?}", other),
            })
            .collect();

        assert_eq!(alerts, vec![(5, false), (1, false), (0, true), (0, false)]);
    }

    #[test]
    fn test_stream_error_keeps_ticket() {
        let mut harness = Harness::seeded(TicketFixture::waiting("t-1", "sess-1", "st-1"));

        harness.stream.fail_all("permission denied");
        let updates = harness.drain();

        assert_matches!(&updates[..], [TicketUpdate::Failed(StatusError::Stream(msg))] if msg == "permission denied");
        assert_eq!(harness.subscription.ticket().unwrap().id, "t-1");
    }

    #[test]
    fn test_integrity_failure_keeps_previous_ticket() {
        let mut harness =
            Harness::seeded(TicketFixture::waiting("t-1", "sess-1", "st-1").position(3));

        harness.push(TicketFixture::waiting("t-1", "sess-1", "st-1").set("purpose", "misc".into()));
        let updates = harness.drain();

        assert_matches!(&updates[..], [TicketUpdate::Rejected(StatusError::DataIntegrity { .. })]);
        assert_eq!(harness.subscription.ticket().unwrap().position, 3);
    }

    #[test]
    #[traced_test]
    fn test_status_regression_is_applied_with_warning() {
        let mut harness =
            Harness::seeded(TicketFixture::serving("t-1", "sess-1", "st-1", "c9"));

        harness.push(TicketFixture::waiting("t-1", "sess-1", "st-1").position(2));
        let updates = harness.drain();

        assert_matches!(
            &updates[..],
            [TicketUpdate::Updated { ticket, serving_alert: false, .. }] if ticket.status == TicketStatus::Waiting
        );
        assert!(logs_contain("Ticket status moved backwards"));
    }

    #[test]
    fn test_multiple_matches_use_first_and_report_extra() {
        let mut harness =
            Harness::seeded(TicketFixture::waiting("t-2", "sess-1", "st-1").position(4));
        harness.push(TicketFixture::waiting("t-1", "sess-1", "st-1").position(2));

        let last = harness.drain().pop().unwrap();
        assert_matches!(
            last,
            TicketUpdate::Updated { ticket, extra_matches: 1, .. } if ticket.id == "t-1"
        );
    }

    #[test]
    fn test_deliveries_after_teardown_are_ignored() {
        let mut harness = Harness::new(Some(TicketFixture::waiting("t-1", "sess-1", "st-1")));
        let pending: Vec<TicketEvent> = std::iter::from_fn(|| harness.events.try_recv().ok()).collect();

        harness.subscription.teardown();

        for event in pending {
            assert_matches!(harness.subscription.apply(event), TicketUpdate::Ignored);
        }
    }

    #[test]
    fn test_resubscribe_does_not_refire_serving_alert() {
        let mut harness =
            Harness::seeded(TicketFixture::serving("t-1", "sess-1", "st-1", "c1"));

        let (sink, events) = EventSink::channel();
        let token = harness.store.read().unwrap();
        harness.subscription.establish(&token, sink);
        harness.events = events;

        assert_eq!(harness.stream.listener_count(), 1);
        assert_matches!(
            harness.drain().pop(),
            Some(TicketUpdate::Updated { serving_alert: false, .. })
        );
    }

    #[test]
    fn test_new_session_starts_without_previous_ticket() {
        let mut harness =
            Harness::seeded(TicketFixture::serving("t-1", "sess-1", "st-1", "c1"));
        harness.push(TicketFixture::serving("t-2", "sess-2", "st-1", "c2"));

        let (sink, events) = EventSink::channel();
        let rotated = SessionToken::new("sess-2").unwrap();
        harness.subscription.establish(&rotated, sink);
        harness.events = events;

        assert!(harness.subscription.ticket().is_none());
        assert_eq!(harness.subscription.session(), Some(&rotated));
        assert_matches!(
            harness.drain().pop(),
            Some(TicketUpdate::Updated { ticket, serving_alert: true, .. }) if ticket.id == "t-2"
        );
    }
}
