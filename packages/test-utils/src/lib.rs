//! Shared test utilities for the qline workspace
//!
//! This crate provides mock implementations of the queue service and
//! fixtures for live-stream ticket documents, so the status engine can be
//! tested without network access or a realtime provider.
//!
//! # Mocks and fixtures
//!
//! - [`MockQueueServer`] - Mock queue service REST endpoints
//! - [`TicketFixture`] - Builder for ticket documents as the live stream stores them
//!
//! # Example
//!
//! ```rust,ignore
//! use qline_test_utils::{MockQueueServer, TicketFixture};
//!
//! #[tokio::test]
//! async fn test_with_mocks() {
//!     let server = MockQueueServer::start().await;
//!     server.mock_counter("c1", "3").await;
//!
//!     let ticket = TicketFixture::waiting("t-1", "sess-1", "st-1").position(4);
//!     // Use server.url() to configure the client, ticket.fields() to seed a stream
//! }
//! ```

mod queue;
mod tickets;

pub use queue::MockQueueServer;
pub use tickets::TicketFixture;
