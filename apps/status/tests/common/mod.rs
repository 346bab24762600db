//! Common test utilities for status engine integration tests
//!
//! Wires a controller to an in-memory live stream, an in-memory session
//! store, a recording navigator and a wiremock-backed queue service.

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod harness;

pub use harness::*;
