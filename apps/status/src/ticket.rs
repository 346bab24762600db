//! Materialized ticket state
//!
//! A [`Ticket`] is rebuilt from scratch from each live document; nothing is
//! patched in place.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use qline_queue_client::Purpose;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{StatusError, StatusResult};
use crate::live::TicketDocument;

/// Lifecycle status of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketStatus {
    Waiting,
    Serving,
    Completed,
    Cancelled,
}

impl TicketStatus {
    /// Statuses a session's live ticket query watches
    pub const ACTIVE: [TicketStatus; 2] = [TicketStatus::Waiting, TicketStatus::Serving];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Waiting => "waiting",
            TicketStatus::Serving => "serving",
            TicketStatus::Completed => "completed",
            TicketStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::Waiting => "Waiting",
            TicketStatus::Serving => "Serving",
            TicketStatus::Completed => "Completed",
            TicketStatus::Cancelled => "Cancelled",
        }
    }

    /// Whether `next` may follow `self`
    ///
    /// `waiting -> serving -> completed`, and `cancelled` from either of the
    /// first two. Repeating the same status is always allowed.
    pub fn can_advance_to(&self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Waiting, Waiting | Serving | Cancelled)
                | (Serving, Serving | Completed | Cancelled)
                | (Completed, Completed)
                | (Cancelled, Cancelled)
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "waiting" => Ok(TicketStatus::Waiting),
            "serving" => Ok(TicketStatus::Serving),
            "completed" => Ok(TicketStatus::Completed),
            "cancelled" => Ok(TicketStatus::Cancelled),
            _ => Err(format!("unknown status '{}'", s)),
        }
    }
}

/// Wait estimate as the service provides it
#[derive(Debug, Clone, PartialEq)]
pub enum EstimatedWait {
    Minutes(f64),
    /// Pre-formatted by the service, shown verbatim
    Text(String),
}

impl fmt::Display for EstimatedWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatedWait::Text(text) => f.write_str(text),
            EstimatedWait::Minutes(minutes) => {
                let unit = if *minutes == 1.0 { "minute" } else { "minutes" };
                if minutes.fract() == 0.0 {
                    write!(f, "{} {}", *minutes as i64, unit)
                } else {
                    write!(f, "{} {}", minutes, unit)
                }
            }
        }
    }
}

/// One queue entry's full state
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub id: String,
    pub station_id: String,
    pub counter_id: Option<String>,
    pub queue_number: String,
    pub purpose: Purpose,
    pub customer_email: String,
    pub status: TicketStatus,
    pub position: i64,
    pub estimated_wait: EstimatedWait,
    pub session_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub served_at: Option<DateTime<Utc>>,
    pub served_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
}

impl Ticket {
    /// Build a ticket from a live document
    ///
    /// Missing fields take the defaults the queue service documents imply;
    /// an unknown `status` or `purpose` is rejected.
    pub fn from_document(document: &TicketDocument) -> StatusResult<Self> {
        let fields = &document.fields;
        let integrity = |reason: String| StatusError::DataIntegrity {
            ticket_id: document.id.clone(),
            reason,
        };

        let status = match fields.get("status") {
            Some(Value::String(raw)) => raw.parse::<TicketStatus>().map_err(integrity)?,
            Some(other) => return Err(integrity(format!("status is not a string: {}", other))),
            None => return Err(integrity("status is missing".to_string())),
        };

        let purpose = match text(fields, "purpose") {
            Some(raw) => raw
                .parse::<Purpose>()
                .map_err(|e| integrity(e.to_string()))?,
            None => Purpose::Payment,
        };

        Ok(Self {
            id: document.id.clone(),
            station_id: text(fields, "stationId").unwrap_or_default(),
            counter_id: text(fields, "counterId").filter(|id| !id.is_empty()),
            queue_number: text(fields, "queueNumber").unwrap_or_default(),
            purpose,
            customer_email: text(fields, "customerEmail").unwrap_or_default(),
            status,
            position: fields.get("position").and_then(number).unwrap_or(0),
            estimated_wait: estimated_wait(fields.get("estimatedWaitTime")),
            session_id: text(fields, "qrId"),
            created_at: timestamp(&document.id, fields, "createdAt"),
            served_at: timestamp(&document.id, fields, "servedAt"),
            served_by: text(fields, "servedBy"),
            completed_at: timestamp(&document.id, fields, "completedAt"),
            cancelled_at: timestamp(&document.id, fields, "cancelledAt"),
            cancelled_by: text(fields, "cancelledBy"),
        })
    }
}

fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn estimated_wait(value: Option<&Value>) -> EstimatedWait {
    match value {
        Some(Value::Number(n)) => EstimatedWait::Minutes(n.as_f64().unwrap_or(0.0)),
        Some(Value::String(s)) => EstimatedWait::Text(s.clone()),
        _ => EstimatedWait::Minutes(0.0),
    }
}

/// Accepts RFC 3339 strings and `{seconds, nanoseconds}` timestamp objects
fn timestamp(ticket_id: &str, fields: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let parsed = match fields.get(key)? {
        Value::Null => return None,
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Object(object) => {
            let seconds = object
                .get("seconds")
                .or_else(|| object.get("_seconds"))
                .and_then(Value::as_i64);
            let nanos = object
                .get("nanoseconds")
                .or_else(|| object.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            seconds.and_then(|s| Utc.timestamp_opt(s, nanos as u32).single())
        }
        _ => None,
    };

    if parsed.is_none() {
        warn!(ticket_id, field = key, "Ignoring unparseable ticket timestamp");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use qline_test_utils::TicketFixture;
    use rstest::rstest;
    use serde_json::json;

    fn document(fixture: TicketFixture) -> TicketDocument {
        TicketDocument::new(fixture.id.clone(), fixture.fields())
    }

    #[test]
    fn test_materializes_waiting_ticket() {
        let ticket = Ticket::from_document(&document(
            TicketFixture::waiting("t-1", "sess-1", "st-1").position(5),
        ))
        .unwrap();

        assert_eq!(ticket.id, "t-1");
        assert_eq!(ticket.status, TicketStatus::Waiting);
        assert_eq!(ticket.position, 5);
        assert_eq!(ticket.counter_id, None);
        assert_eq!(ticket.session_id.as_deref(), Some("sess-1"));
        assert_eq!(ticket.estimated_wait, EstimatedWait::Minutes(5.0));
        assert!(ticket.created_at.is_some());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let fixture = TicketFixture::waiting("t-1", "sess-1", "st-1")
            .without("stationId")
            .without("purpose")
            .without("position")
            .without("estimatedWaitTime")
            .without("queueNumber");
        let ticket = Ticket::from_document(&document(fixture)).unwrap();

        assert_eq!(ticket.station_id, "");
        assert_eq!(ticket.purpose, Purpose::Payment);
        assert_eq!(ticket.position, 0);
        assert_eq!(ticket.queue_number, "");
        assert_eq!(ticket.estimated_wait, EstimatedWait::Minutes(0.0));
    }

    #[test]
    fn test_empty_counter_id_is_absent() {
        let fixture = TicketFixture::waiting("t-1", "sess-1", "st-1").counter("");
        let ticket = Ticket::from_document(&document(fixture)).unwrap();
        assert!(ticket.counter_id.is_none());
    }

    #[test]
    fn test_unknown_status_rejected() {
        let fixture = TicketFixture::waiting("t-1", "sess-1", "st-1").status("paused");
        let result = Ticket::from_document(&document(fixture));
        assert_matches!(result, Err(StatusError::DataIntegrity { ticket_id, .. }) if ticket_id == "t-1");
    }

    #[test]
    fn test_unknown_purpose_rejected() {
        let fixture = TicketFixture::waiting("t-1", "sess-1", "st-1").set("purpose", json!("misc"));
        assert!(Ticket::from_document(&document(fixture)).is_err());
    }

    #[test]
    fn test_timestamp_object_parsed() {
        let fixture = TicketFixture::waiting("t-1", "sess-1", "st-1")
            .set("servedAt", json!({"seconds": 60, "nanoseconds": 0}))
            .set("servedBy", json!("staff-2"));
        let ticket = Ticket::from_document(&document(fixture)).unwrap();
        assert_eq!(ticket.served_at.unwrap().timestamp(), 60);
        assert_eq!(ticket.served_by.as_deref(), Some("staff-2"));
    }

    #[rstest]
    #[case(TicketStatus::Waiting, TicketStatus::Serving, true)]
    #[case(TicketStatus::Waiting, TicketStatus::Cancelled, true)]
    #[case(TicketStatus::Serving, TicketStatus::Completed, true)]
    #[case(TicketStatus::Serving, TicketStatus::Cancelled, true)]
    #[case(TicketStatus::Serving, TicketStatus::Waiting, false)]
    #[case(TicketStatus::Waiting, TicketStatus::Completed, false)]
    #[case(TicketStatus::Completed, TicketStatus::Cancelled, false)]
    #[case(TicketStatus::Cancelled, TicketStatus::Waiting, false)]
    fn test_status_progression(
        #[case] from: TicketStatus,
        #[case] to: TicketStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_advance_to(to), allowed);
    }

    #[rstest]
    #[case(EstimatedWait::Minutes(1.0), "1 minute")]
    #[case(EstimatedWait::Minutes(0.0), "0 minutes")]
    #[case(EstimatedWait::Minutes(12.0), "12 minutes")]
    #[case(EstimatedWait::Minutes(2.5), "2.5 minutes")]
    #[case(EstimatedWait::Text("about an hour".to_string()), "about an hour")]
    fn test_wait_display(#[case] wait: EstimatedWait, #[case] expected: &str) {
        assert_eq!(wait.to_string(), expected);
    }
}
