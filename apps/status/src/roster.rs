//! "Currently serving" roster for the visitor's station

use std::sync::Arc;

use tracing::{debug, warn};

use crate::counter::{BatchLabel, CounterLabelBatch};
use crate::events::EventSink;
use crate::live::{LiveStream, Snapshot, StreamError, Subscription, TicketDocument, TicketFilter};

/// One ticket being served at the station
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub counter_id: String,
    pub queue_number: String,
}

impl RosterEntry {
    /// Entries without both a counter and a number are not shown
    fn from_document(document: &TicketDocument) -> Option<Self> {
        let field = |key: &str| {
            document
                .fields
                .get(key)
                .and_then(|value| value.as_str())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            counter_id: field("counterId")?,
            queue_number: field("queueNumber")?,
        })
    }
}

/// Deliveries and label results for the roster, tagged with the station
/// generation they belong to
#[derive(Debug, Clone)]
pub enum RosterEvent {
    Snapshot { generation: u64, snapshot: Snapshot },
    Error { generation: u64, error: StreamError },
    Label(BatchLabel),
}

/// Watches the tickets being served at one station
pub struct StationServingWatcher {
    stream: Arc<dyn LiveStream>,
    labels: CounterLabelBatch,
    station_id: Option<String>,
    generation: u64,
    active: Option<Subscription>,
    label_sink: Option<EventSink<BatchLabel>>,
    entries: Vec<RosterEntry>,
    error: Option<String>,
}

impl StationServingWatcher {
    pub fn new(stream: Arc<dyn LiveStream>, labels: CounterLabelBatch) -> Self {
        Self {
            stream,
            labels,
            station_id: None,
            generation: 0,
            active: None,
            label_sink: None,
            entries: Vec::new(),
            error: None,
        }
    }

    pub fn station_id(&self) -> Option<&str> {
        self.station_id.as_deref()
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_watching(&self) -> bool {
        self.active.is_some()
    }

    /// Display label for a roster counter, falling back to its id
    pub fn counter_display<'a>(&'a self, counter_id: &'a str) -> &'a str {
        self.labels.label(counter_id).unwrap_or(counter_id)
    }

    /// Rendered roster lines, e.g. `Counter 3: A-001`
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| {
                format!(
                    "Counter {}: {}",
                    self.counter_display(&entry.counter_id),
                    entry.queue_number
                )
            })
            .collect()
    }

    /// Follow `station_id`; the query is only replaced when it changed
    pub fn watch(&mut self, station_id: Option<&str>, sink: EventSink<RosterEvent>) {
        let station_id = station_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        if station_id == self.station_id {
            return;
        }

        self.teardown();
        self.station_id = station_id.clone();

        let Some(station_id) = station_id else {
            return;
        };

        let generation = self.generation;
        let on_snapshot = sink.clone();
        let on_error = sink.clone();
        self.label_sink = Some(EventSink::new(move |label| sink.post(RosterEvent::Label(label))));
        self.active = Some(self.stream.subscribe(
            TicketFilter::serving_at_station(&station_id),
            Arc::new(move |snapshot| {
                on_snapshot.post(RosterEvent::Snapshot {
                    generation,
                    snapshot,
                })
            }),
            Arc::new(move |error| on_error.post(RosterEvent::Error { generation, error })),
        ));
        debug!(station_id = %station_id, generation, "Watching station roster");
    }

    /// Close the query and drop the roster along with its labels
    pub fn teardown(&mut self) {
        self.generation += 1;
        if let Some(subscription) = self.active.take() {
            subscription.unsubscribe();
        }
        self.labels.reset();
        self.label_sink = None;
        self.station_id = None;
        self.entries.clear();
        self.error = None;
    }

    /// Apply one event; returns whether the rendered roster changed
    pub fn apply(&mut self, event: RosterEvent) -> bool {
        match event {
            RosterEvent::Snapshot {
                generation,
                snapshot,
            } if self.is_current(generation) => {
                self.replace(&snapshot);
                true
            }
            RosterEvent::Error { generation, error } if self.is_current(generation) => {
                warn!(station_id = ?self.station_id, error = %error, "Roster stream failed");
                self.error = Some(error.message);
                true
            }
            RosterEvent::Label(label) => self.labels.merge(label),
            _ => {
                debug!("Ignoring roster delivery for a previous station");
                false
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.active.is_some() && generation == self.generation
    }

    fn replace(&mut self, snapshot: &Snapshot) {
        self.entries = snapshot
            .documents
            .iter()
            .filter_map(RosterEntry::from_document)
            .collect();
        self.error = None;

        if let Some(sink) = &self.label_sink {
            self.labels.resolve(
                self.entries.iter().map(|entry| entry.counter_id.as_str()),
                sink,
            );
        }
    }
}

impl Drop for StationServingWatcher {
    fn drop(&mut self) {
        if let Some(subscription) = self.active.take() {
            subscription.unsubscribe();
        }
    }
}
