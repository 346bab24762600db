//! In-memory live stream
//!
//! Holds a ticket collection and re-delivers the full result set to every
//! listener whose query the change touches. Documents are kept in id order,
//! which is the order snapshots list them in.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use serde_json::{Map, Value};
use tracing::debug;

use super::{
    ErrorListener, LiveStream, Snapshot, SnapshotListener, StreamError, Subscription,
    TicketDocument, TicketFilter,
};

/// Snapshot-semantics ticket collection kept in memory
///
/// Listeners are called synchronously from the mutating call, after the
/// internal lock is released.
#[derive(Clone, Default)]
pub struct MemoryLiveStream {
    inner: Arc<Mutex<StreamState>>,
}

#[derive(Default)]
struct StreamState {
    documents: BTreeMap<String, Map<String, Value>>,
    listeners: BTreeMap<u64, Listener>,
    next_listener_id: u64,
    subscribe_count: usize,
}

struct Listener {
    filter: TicketFilter,
    on_snapshot: SnapshotListener,
    on_error: ErrorListener,
}

type Delivery = (SnapshotListener, Snapshot);

impl StreamState {
    fn snapshot_for(&self, filter: &TicketFilter) -> Snapshot {
        Snapshot::new(
            self.documents
                .iter()
                .map(|(id, fields)| TicketDocument::new(id.clone(), fields.clone()))
                .filter(|document| filter.matches(document))
                .collect(),
        )
    }

    /// Deliveries owed to listeners affected by a change to one document
    fn deliveries(&self, before: Option<&TicketDocument>, after: Option<&TicketDocument>) -> Vec<Delivery> {
        self.listeners
            .values()
            .filter(|listener| {
                before.is_some_and(|d| listener.filter.matches(d))
                    || after.is_some_and(|d| listener.filter.matches(d))
            })
            .map(|listener| {
                (
                    listener.on_snapshot.clone(),
                    self.snapshot_for(&listener.filter),
                )
            })
            .collect()
    }
}

impl MemoryLiveStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StreamState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn deliver(deliveries: Vec<Delivery>) {
        for (listener, snapshot) in deliveries {
            listener(snapshot);
        }
    }

    /// Insert or replace a document
    pub fn upsert(&self, id: &str, fields: Map<String, Value>) {
        let deliveries = {
            let mut state = self.lock();
            let before = state
                .documents
                .get(id)
                .map(|f| TicketDocument::new(id, f.clone()));
            state.documents.insert(id.to_string(), fields.clone());
            let after = TicketDocument::new(id, fields);
            state.deliveries(before.as_ref(), Some(&after))
        };
        debug!(document_id = id, listeners = deliveries.len(), "Document upserted");
        Self::deliver(deliveries);
    }

    /// Remove a document
    pub fn remove(&self, id: &str) {
        let deliveries = {
            let mut state = self.lock();
            match state.documents.remove(id) {
                Some(fields) => {
                    let before = TicketDocument::new(id, fields);
                    state.deliveries(Some(&before), None)
                }
                None => Vec::new(),
            }
        };
        Self::deliver(deliveries);
    }

    /// Fail every open subscription; failed listeners are detached
    pub fn fail_all(&self, message: &str) {
        let listeners: Vec<ErrorListener> = {
            let mut state = self.lock();
            std::mem::take(&mut state.listeners)
                .into_values()
                .map(|listener| listener.on_error)
                .collect()
        };
        for on_error in listeners {
            on_error(StreamError::new(message));
        }
    }

    /// Number of currently attached listeners
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Number of `subscribe` calls made over the stream's lifetime
    pub fn subscribe_count(&self) -> usize {
        self.lock().subscribe_count
    }

    /// Filters of the currently attached listeners
    pub fn active_filters(&self) -> Vec<TicketFilter> {
        self.lock()
            .listeners
            .values()
            .map(|listener| listener.filter.clone())
            .collect()
    }
}

impl LiveStream for MemoryLiveStream {
    fn subscribe(
        &self,
        filter: TicketFilter,
        on_snapshot: SnapshotListener,
        on_error: ErrorListener,
    ) -> Subscription {
        let (listener_id, initial) = {
            let mut state = self.lock();
            let listener_id = state.next_listener_id;
            state.next_listener_id += 1;
            state.subscribe_count += 1;
            let initial = state.snapshot_for(&filter);
            state.listeners.insert(
                listener_id,
                Listener {
                    filter,
                    on_snapshot: on_snapshot.clone(),
                    on_error,
                },
            );
            (listener_id, initial)
        };

        on_snapshot(initial);

        let weak: Weak<Mutex<StreamState>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut state = inner.lock().unwrap_or_else(|e| e.into_inner());
                state.listeners.remove(&listener_id);
            }
        })
    }
}
