//! Queue service HTTP client implementation

use std::fmt;
use std::future::Future;
use std::time::Duration;

use qline_shared_config::ApiConfig;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::error::{QueueApiError, QueueApiResult};
use crate::models::{
    AccessGrant, CancelRequest, CounterResponse, ErrorResponse, JoinRequest, JoinResponse,
    Purpose, Station, StationsResponse,
};

/// Maximum error body size kept in error messages
const MAX_ERROR_BODY_SIZE: usize = 500;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 200;

/// Queue service REST client
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct QueueClient {
    http_client: Client,
    config: ApiConfig,
    max_retries: u32,
    retry_base_delay_ms: u64,
}

impl fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueClient")
            .field("base_url", &self.config.base_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl QueueClient {
    /// Create a new client from configuration
    pub fn new(config: &ApiConfig) -> QueueApiResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent("qline/0.1")
            .build()?;

        Ok(Self::with_client(config, http_client))
    }

    /// Create a client with a custom HTTP client (for testing)
    pub fn with_client(config: &ApiConfig, http_client: Client) -> Self {
        Self {
            http_client,
            config: config.clone(),
            max_retries: config.max_retries,
            retry_base_delay_ms: RETRY_BASE_DELAY_MS,
        }
    }

    /// Set retry configuration for idempotent lookups
    pub fn with_retry_config(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay_ms = base_delay_ms;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn require_non_blank<'a>(value: &'a str, what: &str) -> QueueApiResult<&'a str> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(QueueApiError::InvalidInput(format!("{} cannot be empty", what)));
        }
        Ok(trimmed)
    }

    /// Build an endpoint URL, percent-encoding each dynamic segment
    fn segment_url(&self, segments: &[&str]) -> QueueApiResult<Url> {
        let mut url = Url::parse(&self.config.endpoint(""))
            .map_err(|e| QueueApiError::InvalidInput(format!("invalid base URL: {}", e)))?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                QueueApiError::InvalidInput("base URL cannot carry a path".to_string())
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn truncate_error_body(body: String) -> String {
        if body.len() <= MAX_ERROR_BODY_SIZE {
            return body;
        }
        let truncate_at = body
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= MAX_ERROR_BODY_SIZE)
            .last()
            .unwrap_or(0);
        format!("{}... (truncated)", &body[..truncate_at])
    }

    /// Execute an operation with retry logic for transient failures
    async fn with_retry<T, F, Fut>(&self, operation: F) -> QueueApiResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = QueueApiResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay_ms = self.retry_base_delay_ms * 2u64.pow(attempt - 1);
                    warn!(
                        attempt = attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay_ms,
                        error = %e,
                        "Queue service request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a request and turn non-success statuses into errors
    async fn send(&self, request: RequestBuilder) -> QueueApiResult<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                QueueApiError::Timeout
            } else {
                QueueApiError::Http(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(ErrorResponse::into_message)
            .unwrap_or_else(|| Self::truncate_error_body(body));

        if status == StatusCode::FORBIDDEN {
            return Err(QueueApiError::Unauthorized(message));
        }

        Err(QueueApiError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> QueueApiResult<T> {
        let response = self.send(request).await?;
        let text = response.text().await.map_err(QueueApiError::Http)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// List the stations serving a purpose
    ///
    /// Both response shapes the service produces (bare array and
    /// `{ "stations": [...] }`) are normalized into one list.
    #[instrument(skip(self, qr_id))]
    pub async fn available_stations(
        &self,
        purpose: Purpose,
        qr_id: Option<&str>,
    ) -> QueueApiResult<Vec<Station>> {
        let url = self.config.endpoint("queues/available-stations");

        let response: StationsResponse = self
            .with_retry(|| async {
                let mut request = self
                    .http_client
                    .get(&url)
                    .query(&[("purpose", purpose.as_str())]);
                if let Some(qr_id) = qr_id {
                    request = request.query(&[("qrId", qr_id)]);
                }
                self.send_json(request).await
            })
            .await?;

        let stations: Vec<Station> = response.into();
        debug!(purpose = %purpose, count = stations.len(), "Loaded available stations");
        Ok(stations)
    }

    /// Join a station's queue
    ///
    /// Sent exactly once; joining is not idempotent.
    #[instrument(skip(self, request), fields(station_id = %request.station_id))]
    pub async fn join(&self, request: &JoinRequest) -> QueueApiResult<JoinResponse> {
        Self::require_non_blank(&request.email, "email")?;
        Self::require_non_blank(&request.qr_id, "session id")?;
        Self::require_non_blank(&request.station_id, "station id")?;

        let url = self.config.endpoint("queues/join");
        let response: JoinResponse = self
            .send_json(self.http_client.post(&url).json(request))
            .await?;

        debug!(
            rotated_session = response.session_id.is_some(),
            "Joined queue"
        );
        Ok(response)
    }

    /// Exchange a one-time access credential for a session
    ///
    /// # Errors
    /// - `QueueApiError::InvalidInput` if the credential is blank
    /// - `QueueApiError::Unauthorized` if the service answers 403
    #[instrument(skip_all)]
    pub async fn exchange_access(&self, initial_qr_id: &str) -> QueueApiResult<AccessGrant> {
        let initial_qr_id = Self::require_non_blank(initial_qr_id, "access credential")?;

        let url = self.config.endpoint("queues/queue-access");
        let grant: AccessGrant = self
            .send_json(
                self.http_client
                    .get(&url)
                    .query(&[("initialQrId", initial_qr_id)]),
            )
            .await?;

        debug!(path = %grant.path, "Access credential exchanged");
        Ok(grant)
    }

    /// Resolve a counter's display number
    ///
    /// Returns `None` when the service knows the counter but has no number
    /// for it.
    #[instrument(skip(self, qr_id))]
    pub async fn counter_label(
        &self,
        counter_id: &str,
        qr_id: Option<&str>,
    ) -> QueueApiResult<Option<String>> {
        let counter_id = Self::require_non_blank(counter_id, "counter id")?;
        let url = self.segment_url(&["queues", "counters", counter_id])?;

        let response: CounterResponse = self
            .with_retry(|| async {
                let mut request = self.http_client.get(url.clone());
                if let Some(qr_id) = qr_id {
                    request = request.query(&[("qrId", qr_id)]);
                }
                self.send_json(request).await
            })
            .await?;

        Ok(response.into_label())
    }

    /// Ask the service to cancel a ticket
    ///
    /// Sent exactly once; the resulting status change arrives on the live
    /// stream, not in this response.
    #[instrument(skip(self, qr_id, reason))]
    pub async fn cancel(&self, ticket_id: &str, qr_id: &str, reason: &str) -> QueueApiResult<()> {
        let ticket_id = Self::require_non_blank(ticket_id, "ticket id")?;
        let url = self.segment_url(&["queues", ticket_id, "cancel"])?;

        self.send(
            self.http_client
                .post(url)
                .query(&[("qrId", qr_id)])
                .json(&CancelRequest { reason }),
        )
        .await?;

        debug!("Cancellation accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server_url: &str) -> QueueClient {
        QueueClient::new(&ApiConfig::with_url(server_url))
            .unwrap()
            .with_retry_config(0, 1)
    }

    #[test]
    fn test_debug_shows_base_url() {
        let client = test_client("http://localhost:5001");
        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("localhost:5001"));
    }

    #[test]
    fn test_truncate_error_body() {
        let short = "short".to_string();
        assert_eq!(QueueClient::truncate_error_body(short.clone()), short);

        let long = "é".repeat(MAX_ERROR_BODY_SIZE);
        let truncated = QueueClient::truncate_error_body(long);
        assert!(truncated.ends_with("... (truncated)"));
    }

    #[test]
    fn test_segment_url_encodes_ids() {
        let client = test_client("http://localhost:5001/api");
        let url = client.segment_url(&["queues", "counters", "a/b c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5001/api/queues/counters/a%2Fb%20c"
        );
    }

    #[tokio::test]
    async fn test_available_stations_plain_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/queues/available-stations"))
            .and(query_param("purpose", "clinic"))
            .and(query_param("qrId", "sess-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "st-1", "name": "Clinic A", "type": "clinic", "estimatedWaitTime": 12}
            ])))
            .mount(&server)
            .await;

        let stations = test_client(&server.uri())
            .available_stations(Purpose::Clinic, Some("sess-1"))
            .await
            .unwrap();

        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].id.as_deref(), Some("st-1"));
        assert_eq!(stations[0].purpose, Some(Purpose::Clinic));
        assert_eq!(stations[0].estimated_wait_time, Some(12.0));
    }

    #[tokio::test]
    async fn test_available_stations_wrapped_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/queues/available-stations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "stations": [
                    {"id": "st-1", "name": "Cashier", "type": "payment"},
                    {"id": "st-2", "name": "Legacy", "type": "inquire"}
                ]
            })))
            .mount(&server)
            .await;

        let stations = test_client(&server.uri())
            .available_stations(Purpose::Payment, None)
            .await
            .unwrap();

        assert_eq!(stations.len(), 2);
        assert_eq!(stations[1].purpose, None);
    }

    #[tokio::test]
    async fn test_exchange_access_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/queues/queue-access"))
            .and(query_param("initialQrId", "qr-1"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"message": "QR code expired"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = test_client(&server.uri()).exchange_access("qr-1").await;
        assert_matches!(result, Err(QueueApiError::Unauthorized(message)) if message == "QR code expired");
    }

    #[tokio::test]
    async fn test_exchange_access_blank_credential_is_local() {
        let server = MockServer::start().await;
        let result = test_client(&server.uri()).exchange_access("  ").await;
        assert_matches!(result, Err(QueueApiError::InvalidInput(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counter_label_numeric_number() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/queues/counters/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"number": 3})))
            .mount(&server)
            .await;

        let label = test_client(&server.uri())
            .counter_label("c1", Some("sess-1"))
            .await
            .unwrap();
        assert_eq!(label.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_counter_label_missing_number() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/queues/counters/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let label = test_client(&server.uri())
            .counter_label("c1", None)
            .await
            .unwrap();
        assert!(label.is_none());
    }

    #[tokio::test]
    async fn test_counter_label_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/queues/counters/c1"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/queues/counters/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"number": "7"})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri()).with_retry_config(2, 1);
        let label = client.counter_label("c1", None).await.unwrap();
        assert_eq!(label.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_cancel_sends_reason_and_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/queues/t-1/cancel"))
            .and(query_param("qrId", "sess-1"))
            .and(body_json(json!({"reason": "running late"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        test_client(&server.uri())
            .cancel("t-1", "sess-1", "running late")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_surfaces_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/queues/t-1/cancel"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"message": "Queue already completed"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .cancel("t-1", "sess-1", "")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.user_message(), "Queue already completed");
    }

    #[tokio::test]
    async fn test_join_posts_camel_case_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/queues/join"))
            .and(body_json(json!({
                "email": "ana@example.edu",
                "purpose": "registrar",
                "qrId": "sess-1",
                "stationId": "st-9"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionId": "sess-2"})))
            .mount(&server)
            .await;

        let response = test_client(&server.uri())
            .join(&JoinRequest {
                email: "ana@example.edu".to_string(),
                purpose: Purpose::Registrar,
                qr_id: "sess-1".to_string(),
                station_id: "st-9".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.session_id.as_deref(), Some("sess-2"));
    }

    #[test]
    fn test_purpose_parsing() {
        assert_eq!("Clinic".parse::<Purpose>().unwrap(), Purpose::Clinic);
        assert!("misc".parse::<Purpose>().is_err());
        assert_eq!(Purpose::Auditing.to_string(), "Auditing");
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(QueueApiError::Timeout.is_retryable());
        assert!(!QueueApiError::Unauthorized(String::new()).is_retryable());
        assert!(!QueueApiError::Api {
            status: 404,
            message: "missing".to_string()
        }
        .is_retryable());
    }
}
