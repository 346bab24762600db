//! Mock queue service for testing REST interactions
//!
//! Provides a [`MockQueueServer`] that simulates the queue service endpoints
//! (access exchange, stations, join, counters, cancel) without a real backend.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock queue service
///
/// Wraps a [`wiremock::MockServer`] with helpers for the responses the
/// status engine reacts to, including delayed responses for ordering tests.
///
/// # Example
///
/// ```rust,ignore
/// use qline_test_utils::MockQueueServer;
///
/// #[tokio::test]
/// async fn test_counter_lookup() {
///     let server = MockQueueServer::start().await;
///     server.mock_counter_delayed("c1", "1", Duration::from_millis(200)).await;
///     server.mock_counter("c2", "2").await;
///
///     // Configure QueueClient with server.url()
/// }
/// ```
pub struct MockQueueServer {
    server: MockServer,
}

impl MockQueueServer {
    /// Start a new mock queue server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Number of requests received so far, across all endpoints
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    /// Number of requests received for one exact path
    pub async fn requests_to(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|r| r.url.path() == request_path)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Mount a successful access exchange for one credential
    pub async fn mock_access_granted(&self, credential: &str, session_id: &str, destination: &str) {
        Mock::given(method("GET"))
            .and(path("/queues/queue-access"))
            .and(query_param("initialQrId", credential))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sessionId": session_id,
                "path": destination
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a successful access exchange answered after `delay`
    pub async fn mock_access_granted_delayed(
        &self,
        credential: &str,
        session_id: &str,
        destination: &str,
        delay: Duration,
    ) {
        Mock::given(method("GET"))
            .and(path("/queues/queue-access"))
            .and(query_param("initialQrId", credential))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "sessionId": session_id,
                        "path": destination
                    }))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount a 403 for one credential
    pub async fn mock_access_denied(&self, credential: &str) {
        Mock::given(method("GET"))
            .and(path("/queues/queue-access"))
            .and(query_param("initialQrId", credential))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({
                    "message": "Invalid or expired QR code"
                })),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount an arbitrary failure status for the access exchange
    pub async fn mock_access_failure(&self, status_code: u16) {
        Mock::given(method("GET"))
            .and(path("/queues/queue-access"))
            .respond_with(ResponseTemplate::new(status_code).set_body_json(json!({
                "message": "Internal server error"
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a station list returned as a bare array
    pub async fn mock_stations(&self, purpose: &str, stations: Value) {
        Mock::given(method("GET"))
            .and(path("/queues/available-stations"))
            .and(query_param("purpose", purpose))
            .respond_with(ResponseTemplate::new(200).set_body_json(stations))
            .mount(&self.server)
            .await;
    }

    /// Mount a station list returned wrapped in `{ "stations": [...] }`
    pub async fn mock_stations_wrapped(&self, purpose: &str, stations: Value) {
        Mock::given(method("GET"))
            .and(path("/queues/available-stations"))
            .and(query_param("purpose", purpose))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "stations": stations
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a failing station list
    pub async fn mock_stations_failure(&self, status_code: u16, message: &str) {
        Mock::given(method("GET"))
            .and(path("/queues/available-stations"))
            .respond_with(
                ResponseTemplate::new(status_code).set_body_json(json!({ "message": message })),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount a successful join, optionally rotating the session id
    pub async fn mock_join(&self, session_id: Option<&str>) {
        self.mock_join_delayed(session_id, Duration::ZERO).await;
    }

    /// Mount a successful join answered after `delay`
    pub async fn mock_join_delayed(&self, session_id: Option<&str>, delay: Duration) {
        let body = match session_id {
            Some(id) => json!({ "sessionId": id }),
            None => json!({}),
        };
        Mock::given(method("POST"))
            .and(path("/queues/join"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    /// Mount a failing join
    pub async fn mock_join_failure(&self, status_code: u16, message: &str) {
        Mock::given(method("POST"))
            .and(path("/queues/join"))
            .respond_with(
                ResponseTemplate::new(status_code).set_body_json(json!({ "message": message })),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount a counter number lookup
    pub async fn mock_counter(&self, counter_id: &str, number: &str) {
        self.mock_counter_delayed(counter_id, number, Duration::ZERO)
            .await;
    }

    /// Mount a counter number lookup answered after `delay`
    pub async fn mock_counter_delayed(&self, counter_id: &str, number: &str, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(format!("/queues/counters/{}", counter_id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "number": number }))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount a failing counter number lookup
    pub async fn mock_counter_failure(&self, counter_id: &str, status_code: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/queues/counters/{}", counter_id)))
            .respond_with(ResponseTemplate::new(status_code).set_body_json(json!({
                "message": "Counter not found"
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a successful cancellation
    pub async fn mock_cancel_success(&self, ticket_id: &str) {
        self.mock_cancel_delayed(ticket_id, Duration::ZERO).await;
    }

    /// Mount a successful cancellation answered after `delay`
    pub async fn mock_cancel_delayed(&self, ticket_id: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path(format!("/queues/{}/cancel", ticket_id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": true }))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount a failing cancellation carrying a server message
    pub async fn mock_cancel_failure(&self, ticket_id: &str, status_code: u16, message: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/queues/{}/cancel", ticket_id)))
            .respond_with(
                ResponseTemplate::new(status_code).set_body_json(json!({ "message": message })),
            )
            .mount(&self.server)
            .await;
    }
}
