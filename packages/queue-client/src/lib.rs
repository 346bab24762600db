//! REST client for the qline queue service
//!
//! This crate wraps the queue service endpoints the visitor-facing client
//! consumes:
//! - Station listing per purpose
//! - Joining a station's queue
//! - Exchanging a one-time access credential for a session
//! - Counter display numbers
//! - Ticket cancellation
//!
//! Ticket state itself is not fetched over REST; it arrives on the live
//! stream consumed by `qline-status`.
//!
//! # Example
//!
//! ```rust,no_run
//! use qline_queue_client::{Purpose, QueueClient};
//! use qline_shared_config::ApiConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = QueueClient::new(&ApiConfig::with_url("https://functions.example.com"))?;
//!
//! let stations = client.available_stations(Purpose::Payment, Some("session-id")).await?;
//! for station in stations {
//!     println!("{}", station.name);
//! }
//!
//! let label = client.counter_label("counter-7", Some("session-id")).await?;
//! println!("{}", label.unwrap_or_else(|| "counter-7".to_string()));
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod models;

pub use client::QueueClient;
pub use error::{QueueApiError, QueueApiResult};
pub use models::{AccessGrant, JoinRequest, JoinResponse, Purpose, Station, UnknownPurpose};
