//! Ticket cancellation dialog
//!
//! Cancelling never changes the displayed status optimistically; the
//! resulting `cancelled` transition arrives on the live stream like any other
//! change.

use std::sync::Arc;

use qline_queue_client::QueueClient;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{StatusError, StatusResult};
use crate::events::EventSink;
use crate::session::SessionStore;

const MISSING_TICKET: &str = "Ticket ID is missing.";

/// Completion of a cancellation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
    pub ticket_id: String,
    /// `Err` carries the text shown in the dialog
    pub result: Result<(), String>,
}

/// Cancel dialog state and its single in-flight request
#[derive(Default)]
pub struct CancelWorkflow {
    dialog_open: bool,
    reason: String,
    error: Option<String>,
    in_flight: Option<JoinHandle<()>>,
}

impl CancelWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.dialog_open
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn open(&mut self) {
        self.dialog_open = true;
    }

    /// Close the dialog, discarding the reason and any error
    pub fn close(&mut self) -> StatusResult<()> {
        if self.is_in_flight() {
            return Err(StatusError::InFlight("Cancellation"));
        }
        self.dialog_open = false;
        self.reason.clear();
        self.error = None;
        Ok(())
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = reason.into();
    }

    /// Send the cancellation for `ticket_id`
    ///
    /// The request is sent once; its outcome is posted to `sink` and must be
    /// handed back through [`CancelWorkflow::settle`].
    pub fn submit(
        &mut self,
        client: &QueueClient,
        store: &Arc<dyn SessionStore>,
        ticket_id: Option<&str>,
        sink: EventSink<CancelOutcome>,
    ) -> StatusResult<()> {
        if self.is_in_flight() {
            return Err(StatusError::InFlight("Cancellation"));
        }

        let Some(ticket_id) = ticket_id.map(str::trim).filter(|id| !id.is_empty()) else {
            self.error = Some(MISSING_TICKET.to_string());
            return Err(StatusError::MissingPrecondition(MISSING_TICKET.to_string()));
        };

        // A missing token is sent as an empty qrId; the service decides.
        let qr_id = store
            .read()
            .map(|token| token.as_str().to_string())
            .unwrap_or_default();
        let ticket_id = ticket_id.to_string();
        let reason = self.reason.clone();
        let client = client.clone();

        self.error = None;
        debug!(ticket_id = %ticket_id, "Submitting cancellation");
        self.in_flight = Some(tokio::spawn(async move {
            let result = client
                .cancel(&ticket_id, &qr_id, &reason)
                .await
                .map_err(|e| e.user_message());
            sink.post(CancelOutcome { ticket_id, result });
        }));
        Ok(())
    }

    /// Apply the outcome of the submitted request
    pub fn settle(&mut self, outcome: CancelOutcome) {
        self.in_flight = None;
        match outcome.result {
            Ok(()) => {
                info!(ticket_id = %outcome.ticket_id, "Cancellation accepted");
                self.dialog_open = false;
                self.reason.clear();
                self.error = None;
            }
            Err(message) => {
                warn!(ticket_id = %outcome.ticket_id, error = %message, "Cancellation failed");
                self.error = Some(message);
            }
        }
    }
}

impl Drop for CancelWorkflow {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}
