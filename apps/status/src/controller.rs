//! Status page controller
//!
//! One tokio task owns every component of the status page and applies
//! events strictly one at a time:
//!
//! ```text
//! live stream ──┐
//! REST lookups ─┼─> mpsc<ControllerEvent> ──> StatusController ──> watch<StatusView>
//! commands ─────┘
//! ```
//!
//! Producers never touch state; they only post tagged events. Each component
//! drops events whose tag (subscription generation or identifier) is no
//! longer current, so late results of superseded work never reach the view.

use std::sync::Arc;

use qline_queue_client::QueueClient;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cancel::{CancelOutcome, CancelWorkflow};
use crate::counter::{CounterLabel, CounterLabelBatch, CounterNumberResolver};
use crate::events::EventSink;
use crate::live::LiveStream;
use crate::navigation::{Navigator, Route};
use crate::roster::{RosterEvent, StationServingWatcher};
use crate::session::SessionStore;
use crate::subscription::{TicketEvent, TicketSubscription, TicketUpdate};
use crate::view::{CancelView, Phase, StatusView};

/// Collaborators injected into the controller
#[derive(Clone)]
pub struct StatusDeps {
    pub client: QueueClient,
    pub stream: Arc<dyn LiveStream>,
    pub store: Arc<dyn SessionStore>,
    pub navigator: Arc<dyn Navigator>,
}

/// Visitor actions on the status page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    OpenCancelDialog,
    CloseCancelDialog,
    SetCancelReason(String),
    SubmitCancel,
    DismissServingAlert,
    /// Re-read the session token and replace the ticket subscription
    Resubscribe,
    Shutdown,
}

/// Everything the controller loop consumes
#[derive(Debug)]
pub enum ControllerEvent {
    Ticket(TicketEvent),
    Roster(RosterEvent),
    Counter(CounterLabel),
    Cancel(CancelOutcome),
    Command(Command),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Owns the status page state; run it with [`StatusController::spawn`]
pub struct StatusController {
    deps: StatusDeps,
    subscription: TicketSubscription,
    counter: CounterNumberResolver,
    roster: StationServingWatcher,
    cancel: CancelWorkflow,
    view: StatusView,
    view_tx: watch::Sender<StatusView>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    events_rx: mpsc::UnboundedReceiver<ControllerEvent>,
}

impl StatusController {
    pub fn new(deps: StatusDeps) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, _) = watch::channel(StatusView::default());
        let labels = CounterLabelBatch::new(deps.client.clone(), deps.store.clone());

        Self {
            subscription: TicketSubscription::new(deps.stream.clone(), deps.store.clone()),
            counter: CounterNumberResolver::new(deps.client.clone(), deps.store.clone()),
            roster: StationServingWatcher::new(deps.stream.clone(), labels),
            cancel: CancelWorkflow::new(),
            view: StatusView::default(),
            view_tx,
            events_tx,
            events_rx,
            deps,
        }
    }

    /// Start the controller on its own task
    pub fn spawn(deps: StatusDeps) -> StatusHandle {
        let controller = Self::new(deps);
        let events = controller.events_tx.clone();
        let view = controller.view_tx.subscribe();
        let task = tokio::spawn(controller.run());
        StatusHandle { events, view, task }
    }

    async fn run(mut self) {
        if self.start() == Flow::Stop {
            return;
        }

        loop {
            tokio::select! {
                event = self.events_rx.recv() => {
                    let Some(event) = event else { break };
                    if self.handle(event) == Flow::Stop {
                        break;
                    }
                }
                _ = self.view_tx.closed() => {
                    debug!("All status views dropped; stopping controller");
                    break;
                }
            }
        }

        self.teardown();
        debug!("Status controller stopped");
    }

    fn start(&mut self) -> Flow {
        let Some(token) = self.deps.store.read() else {
            info!("No session on the status page; sending visitor to join");
            self.redirect(Route::Join);
            return Flow::Stop;
        };

        if self.subscription.session().is_some_and(|previous| *previous != token) {
            self.reset_for_new_session();
        }

        let sink = self.ticket_sink();
        self.subscription.establish(&token, sink);
        self.publish();
        Flow::Continue
    }

    /// Drop everything derived from the previous session's ticket
    fn reset_for_new_session(&mut self) {
        self.counter.clear();
        self.roster.teardown();
        self.view.phase = Phase::Loading;
        self.view.ticket = None;
        self.view.error = None;
        self.view.extra_ticket_matches = 0;
        self.view.serving_alert_open = false;
    }

    fn handle(&mut self, event: ControllerEvent) -> Flow {
        let flow = match event {
            ControllerEvent::Ticket(event) => self.on_ticket(event),
            ControllerEvent::Roster(event) => {
                self.roster.apply(event);
                Flow::Continue
            }
            ControllerEvent::Counter(label) => {
                self.counter.accept(label);
                Flow::Continue
            }
            ControllerEvent::Cancel(outcome) => {
                self.cancel.settle(outcome);
                Flow::Continue
            }
            ControllerEvent::Command(command) => self.on_command(command),
        };

        if flow == Flow::Continue {
            self.publish();
        }
        flow
    }

    fn on_ticket(&mut self, event: TicketEvent) -> Flow {
        match self.subscription.apply(event) {
            TicketUpdate::Updated {
                ticket,
                serving_alert,
                extra_matches,
            } => {
                if serving_alert {
                    info!(ticket_id = %ticket.id, "Ticket is now being served");
                    self.view.serving_alert_open = true;
                    self.view.serving_alert_count += 1;
                }

                let counter_sink = self.counter_sink();
                self.counter
                    .request(ticket.counter_id.as_deref(), counter_sink);
                let roster_sink = self.roster_sink();
                self.roster.watch(Some(ticket.station_id.as_str()), roster_sink);

                self.view.phase = Phase::Ready;
                self.view.error = None;
                self.view.extra_ticket_matches = extra_matches;
                self.view.ticket = Some(ticket);
                Flow::Continue
            }
            TicketUpdate::Invalidated => {
                self.redirect(Route::Unauthorized);
                Flow::Stop
            }
            TicketUpdate::Rejected(e) | TicketUpdate::Failed(e) => {
                self.view.phase = Phase::Ready;
                self.view.error = Some(e.user_message());
                Flow::Continue
            }
            TicketUpdate::Ignored => Flow::Continue,
        }
    }

    fn on_command(&mut self, command: Command) -> Flow {
        debug!(?command, "Status command");
        match command {
            Command::OpenCancelDialog => self.cancel.open(),
            Command::CloseCancelDialog => {
                if let Err(e) = self.cancel.close() {
                    debug!(error = %e, "Cancel dialog kept open");
                }
            }
            Command::SetCancelReason(reason) => self.cancel.set_reason(reason),
            Command::SubmitCancel => {
                let ticket_id = self.view.ticket.as_ref().map(|ticket| ticket.id.clone());
                let sink = EventSink::forward(self.events_tx.clone(), ControllerEvent::Cancel);
                if let Err(e) = self.cancel.submit(
                    &self.deps.client,
                    &self.deps.store,
                    ticket_id.as_deref(),
                    sink,
                ) {
                    warn!(error = %e, "Cancellation not sent");
                }
            }
            Command::DismissServingAlert => self.view.serving_alert_open = false,
            Command::Resubscribe => return self.start(),
            Command::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    /// Leave the page: stop every source, publish the final view, navigate
    fn redirect(&mut self, route: Route) {
        self.teardown();
        self.view.phase = Phase::Redirected(route.clone());
        self.publish();
        self.deps.navigator.navigate(route);
    }

    fn teardown(&mut self) {
        self.subscription.teardown();
        self.counter.clear();
        self.roster.teardown();
    }

    fn publish(&mut self) {
        self.view.counter_label = self.counter.label().map(str::to_string);
        self.view.roster = self.roster.lines();
        self.view.roster_error = self.roster.error().map(str::to_string);
        self.view.cancel = CancelView {
            open: self.cancel.is_open(),
            reason: self.cancel.reason().to_string(),
            in_flight: self.cancel.is_in_flight(),
            error: self.cancel.error().map(str::to_string),
        };
        self.view_tx.send_replace(self.view.clone());
    }

    fn ticket_sink(&self) -> EventSink<TicketEvent> {
        EventSink::forward(self.events_tx.clone(), ControllerEvent::Ticket)
    }

    fn counter_sink(&self) -> EventSink<CounterLabel> {
        EventSink::forward(self.events_tx.clone(), ControllerEvent::Counter)
    }

    fn roster_sink(&self) -> EventSink<RosterEvent> {
        EventSink::forward(self.events_tx.clone(), ControllerEvent::Roster)
    }
}

/// Handle to a running [`StatusController`]
///
/// Dropping the handle (and every view receiver cloned from it) stops the
/// controller and closes its subscriptions.
pub struct StatusHandle {
    events: mpsc::UnboundedSender<ControllerEvent>,
    view: watch::Receiver<StatusView>,
    task: JoinHandle<()>,
}

impl StatusHandle {
    /// Latest published view
    pub fn view(&self) -> StatusView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusView> {
        self.view.clone()
    }

    /// Wait for the first view satisfying `predicate`
    ///
    /// Returns the final view instead if the controller stops first.
    pub async fn wait_until(&self, mut predicate: impl FnMut(&StatusView) -> bool) -> StatusView {
        let mut view = self.view.clone();
        let matched = view.wait_for(|v| predicate(v)).await.map(|v| v.clone());
        matched.unwrap_or_else(|_| view.borrow().clone())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn send(&self, command: Command) {
        if self.events.send(ControllerEvent::Command(command)).is_err() {
            debug!("Status controller already stopped");
        }
    }

    pub fn open_cancel_dialog(&self) {
        self.send(Command::OpenCancelDialog);
    }

    pub fn close_cancel_dialog(&self) {
        self.send(Command::CloseCancelDialog);
    }

    pub fn set_cancel_reason(&self, reason: impl Into<String>) {
        self.send(Command::SetCancelReason(reason.into()));
    }

    pub fn submit_cancel(&self) {
        self.send(Command::SubmitCancel);
    }

    pub fn dismiss_serving_alert(&self) {
        self.send(Command::DismissServingAlert);
    }

    pub fn resubscribe(&self) {
        self.send(Command::Resubscribe);
    }

    /// Stop the controller and wait for its teardown
    pub async fn shutdown(self) {
        self.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            if e.is_panic() {
                warn!(error = %e, "Status controller panicked");
            }
        }
    }
}
