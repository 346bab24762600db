//! Ticket document fixtures
//!
//! Documents are built in the shape the realtime provider stores them:
//! camelCase fields, the session token under `qrId`.

use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Builder for one ticket document in the live collection
#[derive(Debug, Clone)]
pub struct TicketFixture {
    pub id: String,
    fields: Map<String, Value>,
}

impl TicketFixture {
    /// A waiting ticket at position 1 with a five-minute estimate
    pub fn waiting(id: &str, session_id: &str, station_id: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("qrId".into(), json!(session_id));
        fields.insert("stationId".into(), json!(station_id));
        fields.insert("queueNumber".into(), json!("A-001"));
        fields.insert("purpose".into(), json!("payment"));
        fields.insert("customerEmail".into(), json!("visitor@example.edu"));
        fields.insert("status".into(), json!("waiting"));
        fields.insert("position".into(), json!(1));
        fields.insert("estimatedWaitTime".into(), json!(5));
        fields.insert("createdAt".into(), json!("2026-10-15T08:00:00Z"));
        Self {
            id: id.to_string(),
            fields,
        }
    }

    /// A ticket being served at `counter_id`
    pub fn serving(id: &str, session_id: &str, station_id: &str, counter_id: &str) -> Self {
        Self::waiting(id, session_id, station_id)
            .status("serving")
            .counter(counter_id)
            .position(0)
            .set("servedAt", json!("2026-10-15T08:20:00Z"))
    }

    /// A ticket with a random id
    pub fn random(session_id: &str, station_id: &str) -> Self {
        Self::waiting(&Uuid::new_v4().to_string(), session_id, station_id)
    }

    /// Set any field verbatim
    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Remove a field entirely
    pub fn without(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    pub fn status(self, status: &str) -> Self {
        self.set("status", json!(status))
    }

    pub fn position(self, position: i64) -> Self {
        self.set("position", json!(position))
    }

    pub fn counter(self, counter_id: &str) -> Self {
        self.set("counterId", json!(counter_id))
    }

    pub fn number(self, queue_number: &str) -> Self {
        self.set("queueNumber", json!(queue_number))
    }

    pub fn station(self, station_id: &str) -> Self {
        self.set("stationId", json!(station_id))
    }

    pub fn wait(self, estimate: Value) -> Self {
        self.set("estimatedWaitTime", estimate)
    }

    /// The document fields as a JSON object
    pub fn fields(&self) -> Map<String, Value> {
        self.fields.clone()
    }
}
