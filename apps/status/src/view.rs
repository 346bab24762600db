//! Composed status-page view
//!
//! Everything a renderer needs, rebuilt by the controller after each applied
//! event and published as one value.

use qline_queue_client::Purpose;

use crate::navigation::Route;
use crate::ticket::{Ticket, TicketStatus};

/// Lifecycle of the status page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for the first ticket delivery
    #[default]
    Loading,
    Ready,
    /// The page navigated away; the view is final
    Redirected(Route),
}

/// Cancel dialog as shown to the visitor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CancelView {
    pub open: bool,
    pub reason: String,
    pub in_flight: bool,
    pub error: Option<String>,
}

/// Everything the status page shows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusView {
    pub phase: Phase,
    pub ticket: Option<Ticket>,
    /// Ticket stream or integrity error; the previous ticket stays shown
    pub error: Option<String>,
    /// Resolved label of the visitor's counter
    pub counter_label: Option<String>,
    pub roster: Vec<String>,
    pub roster_error: Option<String>,
    pub serving_alert_open: bool,
    /// Number of transitions into `serving` seen so far
    pub serving_alert_count: usize,
    /// Live tickets beyond the displayed one in the last delivery
    pub extra_ticket_matches: usize,
    pub cancel: CancelView,
}

impl StatusView {
    pub fn is_redirected(&self) -> bool {
        matches!(self.phase, Phase::Redirected(_))
    }

    /// Counter label, or the raw counter id while unresolved
    pub fn counter_display(&self) -> Option<&str> {
        self.counter_label
            .as_deref()
            .or_else(|| self.ticket.as_ref()?.counter_id.as_deref())
    }

    pub fn status_label(&self) -> Option<&'static str> {
        self.ticket.as_ref().map(|ticket| status_label(ticket.status))
    }

    pub fn purpose_label(&self) -> Option<&'static str> {
        self.ticket.as_ref().map(|ticket| purpose_label(ticket.purpose))
    }

    pub fn wait_label(&self) -> Option<String> {
        self.ticket
            .as_ref()
            .map(|ticket| ticket.estimated_wait.to_string())
    }

    /// Text of the "now serving" notification
    pub fn serving_message(&self) -> Option<String> {
        let ticket = self.ticket.as_ref()?;
        Some(match self.counter_display() {
            Some(counter) => format!(
                "You are now being served. Please go to counter number {} for queue number {}.",
                counter, ticket.queue_number
            ),
            None => format!(
                "You are now being served. Please go to the counter for queue number {}.",
                ticket.queue_number
            ),
        })
    }
}

pub fn status_label(status: TicketStatus) -> &'static str {
    status.label()
}

pub fn purpose_label(purpose: Purpose) -> &'static str {
    purpose.label()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::TicketDocument;
    use qline_test_utils::TicketFixture;

    fn view_with(fixture: TicketFixture) -> StatusView {
        let document = TicketDocument::new(fixture.id.clone(), fixture.fields());
        StatusView {
            phase: Phase::Ready,
            ticket: Some(Ticket::from_document(&document).unwrap()),
            ..StatusView::default()
        }
    }

    #[test]
    fn test_counter_display_falls_back_to_id() {
        let mut view = view_with(TicketFixture::serving("t-1", "s", "st-1", "c9"));
        assert_eq!(view.counter_display(), Some("c9"));

        view.counter_label = Some("4".to_string());
        assert_eq!(view.counter_display(), Some("4"));
    }

    #[test]
    fn test_serving_message_names_counter() {
        let mut view = view_with(TicketFixture::serving("t-1", "s", "st-1", "c9").number("B-014"));
        view.counter_label = Some("4".to_string());
        assert_eq!(
            view.serving_message().unwrap(),
            "You are now being served. Please go to counter number 4 for queue number B-014."
        );
    }

    #[test]
    fn test_serving_message_without_counter() {
        let view = view_with(TicketFixture::waiting("t-1", "s", "st-1").number("B-014"));
        assert_eq!(
            view.serving_message().unwrap(),
            "You are now being served. Please go to the counter for queue number B-014."
        );
    }

    #[test]
    fn test_labels() {
        let view = view_with(TicketFixture::waiting("t-1", "s", "st-1"));
        assert_eq!(view.status_label(), Some("Waiting"));
        assert_eq!(view.purpose_label(), Some("Payment"));
        assert_eq!(view.wait_label().as_deref(), Some("5 minutes"));
        assert_eq!(StatusView::default().status_label(), None);
    }
}
