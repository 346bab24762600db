//! Counter display-number resolution
//!
//! Counters are identified by opaque ids but shown by a human label that
//! only the queue service knows. [`CounterNumberResolver`] tracks the label
//! of the visitor's own counter; [`CounterLabelBatch`] resolves the labels
//! of every counter on the station roster.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use qline_queue_client::QueueClient;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::events::EventSink;
use crate::session::SessionStore;

/// Result of one counter lookup, tagged with the id it was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterLabel {
    pub counter_id: String,
    /// `None` when the lookup failed or the service has no number
    pub label: Option<String>,
}

/// Resolves the label of a single, changing counter id
///
/// Last identifier wins: a new id aborts the previous lookup and a result
/// for any id other than the current one is discarded.
pub struct CounterNumberResolver {
    client: QueueClient,
    store: Arc<dyn SessionStore>,
    counter_id: Option<String>,
    label: Option<String>,
    in_flight: Option<JoinHandle<()>>,
}

impl CounterNumberResolver {
    pub fn new(client: QueueClient, store: Arc<dyn SessionStore>) -> Self {
        Self {
            client,
            store,
            counter_id: None,
            label: None,
            in_flight: None,
        }
    }

    pub fn counter_id(&self) -> Option<&str> {
        self.counter_id.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Resolved label, falling back to the raw counter id
    pub fn display(&self) -> Option<&str> {
        self.label().or(self.counter_id())
    }

    pub fn is_resolving(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Follow `counter_id`; issues one lookup when it changed
    pub fn request(&mut self, counter_id: Option<&str>, sink: EventSink<CounterLabel>) {
        let counter_id = counter_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        if counter_id == self.counter_id {
            return;
        }

        self.cancel();
        self.counter_id = counter_id.clone();
        self.label = None;

        let Some(counter_id) = counter_id else {
            return;
        };

        debug!(counter_id = %counter_id, "Resolving counter label");
        let client = self.client.clone();
        let qr_id = self.store.read();
        self.in_flight = Some(tokio::spawn(async move {
            let qr_id = qr_id.as_ref().map(|token| token.as_str());
            let label = match client.counter_label(&counter_id, qr_id).await {
                Ok(label) => label,
                Err(e) => {
                    warn!(counter_id = %counter_id, error = %e, "Counter lookup failed");
                    None
                }
            };
            sink.post(CounterLabel { counter_id, label });
        }));
    }

    /// Apply a lookup result; returns whether it was current
    pub fn accept(&mut self, result: CounterLabel) -> bool {
        if self.counter_id.as_deref() != Some(result.counter_id.as_str()) {
            debug!(counter_id = %result.counter_id, "Discarding stale counter label");
            return false;
        }
        self.in_flight = None;
        self.label = result.label;
        true
    }

    /// Forget the current id and abort its lookup
    pub fn clear(&mut self) {
        self.cancel();
        self.counter_id = None;
        self.label = None;
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

impl Drop for CounterNumberResolver {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Result of one lookup issued by a [`CounterLabelBatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLabel {
    pub generation: u64,
    pub counter_id: String,
    /// `Err` carries the failure text; failed ids are retried on the next
    /// `resolve` call
    pub outcome: Result<Option<String>, String>,
}

/// Concurrent label resolution for a set of counter ids
///
/// Every lookup runs as its own task, so one slow or failing counter never
/// holds up the rest; each result is merged as it arrives. `reset` starts a
/// new generation and results from older generations are dropped.
pub struct CounterLabelBatch {
    client: QueueClient,
    store: Arc<dyn SessionStore>,
    generation: u64,
    labels: HashMap<String, Option<String>>,
    pending: HashMap<String, JoinHandle<()>>,
}

impl CounterLabelBatch {
    pub fn new(client: QueueClient, store: Arc<dyn SessionStore>) -> Self {
        Self {
            client,
            store,
            generation: 0,
            labels: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Resolved label for `counter_id`, if any
    pub fn label(&self, counter_id: &str) -> Option<&str> {
        self.labels.get(counter_id).and_then(|label| label.as_deref())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Issue lookups for every id that is neither resolved nor pending
    ///
    /// Returns the number of lookups started.
    pub fn resolve<'a>(
        &mut self,
        counter_ids: impl IntoIterator<Item = &'a str>,
        sink: &EventSink<BatchLabel>,
    ) -> usize {
        let wanted: HashSet<&str> = counter_ids
            .into_iter()
            .filter(|id| !self.labels.contains_key(*id) && !self.pending.contains_key(*id))
            .collect();
        if wanted.is_empty() {
            return 0;
        }

        let qr_id = self.store.read();
        let generation = self.generation;
        for counter_id in &wanted {
            let counter_id = counter_id.to_string();
            let client = self.client.clone();
            let qr_id = qr_id.clone();
            let sink = sink.clone();
            let task_id = counter_id.clone();
            let handle = tokio::spawn(async move {
                let outcome = client
                    .counter_label(&task_id, qr_id.as_ref().map(|token| token.as_str()))
                    .await
                    .map_err(|e| e.user_message());
                sink.post(BatchLabel {
                    generation,
                    counter_id: task_id,
                    outcome,
                });
            });
            self.pending.insert(counter_id, handle);
        }

        debug!(generation, count = wanted.len(), "Resolving roster counter labels");
        wanted.len()
    }

    /// Merge one result; returns whether the label cache changed
    pub fn merge(&mut self, result: BatchLabel) -> bool {
        if result.generation != self.generation {
            debug!(counter_id = %result.counter_id, "Discarding label from previous station");
            return false;
        }
        self.pending.remove(&result.counter_id);

        match result.outcome {
            Ok(label) => {
                self.labels.insert(result.counter_id, label);
                true
            }
            Err(message) => {
                warn!(counter_id = %result.counter_id, error = %message, "Roster counter lookup failed");
                false
            }
        }
    }

    /// Abort pending lookups, drop cached labels, start a new generation
    pub fn reset(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
        self.labels.clear();
        self.generation += 1;
    }
}

impl Drop for CounterLabelBatch {
    fn drop(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}
