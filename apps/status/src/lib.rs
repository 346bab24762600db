//! qline status engine
//!
//! Client-side synchronization for an anonymous queue session:
//! - [`SessionBootstrap`] trades a one-time access credential for a session
//!   token
//! - [`JoinWorkflow`] lists stations and joins a queue
//! - [`StatusController`] keeps one coherent view of the visitor's ticket,
//!   combining the live ticket stream with counter-label lookups, the
//!   station's "currently serving" roster, and cancellation
//!
//! Ticket state arrives on a [`LiveStream`]; the queue service REST calls go
//! through `qline-queue-client`. The session token is persisted through an
//! injected [`SessionStore`] and navigation is announced to an injected
//! [`Navigator`].

pub mod bootstrap;
pub mod cancel;
pub mod controller;
pub mod counter;
pub mod error;
pub mod events;
pub mod join;
pub mod live;
pub mod navigation;
pub mod roster;
pub mod session;
pub mod subscription;
pub mod ticket;
pub mod view;

// Re-export commonly used types
pub use bootstrap::{BootstrapState, SessionBootstrap};
pub use cancel::{CancelOutcome, CancelWorkflow};
pub use controller::{Command, StatusController, StatusDeps, StatusHandle};
pub use error::{StatusError, StatusResult};
pub use events::EventSink;
pub use join::{JoinForm, JoinWorkflow};
pub use live::{LiveStream, MemoryLiveStream, Snapshot, Subscription, TicketDocument, TicketFilter};
pub use navigation::{LogNavigator, Navigator, RecordingNavigator, Route};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore, SessionToken};
pub use ticket::{EstimatedWait, Ticket, TicketStatus};
pub use view::{Phase, StatusView};
