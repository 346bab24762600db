//! Join page: pick a station for a purpose and enter its queue

use std::sync::Arc;
use std::time::Duration;

use qline_queue_client::{JoinRequest, Purpose, QueueClient, Station};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::error::{StatusError, StatusResult};
use crate::navigation::{Navigator, Route};
use crate::session::{SessionStore, SessionToken};

const MISSING_SESSION: &str = "Session not found. Please scan the QR code again.";
const MISSING_STATION: &str = "Station ID is missing.";

/// What the visitor entered on the join form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinForm {
    pub email: String,
    pub purpose: Option<Purpose>,
}

impl JoinForm {
    pub fn new(email: impl Into<String>, purpose: Purpose) -> Self {
        Self {
            email: email.into(),
            purpose: Some(purpose),
        }
    }

    fn require_purpose(&self) -> StatusResult<Purpose> {
        if self.email.trim().is_empty() {
            return Err(StatusError::MissingPrecondition(
                "Please enter your email address.".to_string(),
            ));
        }
        self.purpose
            .ok_or_else(|| StatusError::MissingPrecondition("Please select a purpose.".to_string()))
    }
}

/// Station listing and queue entry
pub struct JoinWorkflow {
    client: QueueClient,
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    session_ttl: Duration,
    joining: Mutex<()>,
}

impl JoinWorkflow {
    pub fn new(
        client: QueueClient,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            client,
            store,
            navigator,
            session_ttl,
            joining: Mutex::new(()),
        }
    }

    /// Stations serving the form's purpose
    #[instrument(skip(self, form), fields(purpose = ?form.purpose))]
    pub async fn load_stations(&self, form: &JoinForm) -> StatusResult<Vec<Station>> {
        let purpose = form.require_purpose()?;
        let token = self.store.read();
        let stations = self
            .client
            .available_stations(purpose, token.as_ref().map(SessionToken::as_str))
            .await?;
        Ok(stations)
    }

    /// Join `station`'s queue and move on to the status page
    ///
    /// A rotated session id returned by the service replaces the stored one.
    #[instrument(skip(self, form, station), fields(station = %station.name))]
    pub async fn join(&self, form: &JoinForm, station: &Station) -> StatusResult<Route> {
        let _joining = self
            .joining
            .try_lock()
            .map_err(|_| StatusError::InFlight("Join"))?;

        let purpose = form.require_purpose()?;
        let Some(token) = self.store.read() else {
            return Err(StatusError::MissingPrecondition(MISSING_SESSION.to_string()));
        };
        let Some(station_id) = station.id.as_deref().filter(|id| !id.trim().is_empty()) else {
            return Err(StatusError::MissingPrecondition(MISSING_STATION.to_string()));
        };

        let request = JoinRequest {
            email: form.email.trim().to_string(),
            purpose,
            qr_id: token.as_str().to_string(),
            station_id: station_id.to_string(),
        };
        let response = self.client.join(&request).await?;

        if let Some(rotated) = response.session_id.and_then(SessionToken::new) {
            self.store.write(&rotated, self.session_ttl)?;
            info!("Session rotated on join");
        }

        info!(station_id, "Joined queue");
        self.navigator.navigate(Route::Status);
        Ok(Route::Status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::RecordingNavigator;
    use crate::session::MemorySessionStore;
    use assert_matches::assert_matches;
    use qline_shared_config::ApiConfig;
    use qline_test_utils::MockQueueServer;
    use serde_json::json;

    const WEEK: Duration = Duration::from_secs(604_800);

    fn workflow(
        server: &MockQueueServer,
        store: &MemorySessionStore,
        navigator: &RecordingNavigator,
    ) -> JoinWorkflow {
        JoinWorkflow::new(
            QueueClient::new(&ApiConfig::with_url(server.url()).with_max_retries(0)).unwrap(),
            Arc::new(store.clone()),
            Arc::new(navigator.clone()),
            WEEK,
        )
    }

    fn station(id: Option<&str>) -> Station {
        Station {
            id: id.map(str::to_string),
            name: "Cashier".to_string(),
            purpose: Some(Purpose::Payment),
            description: None,
            created_at: None,
            updated_at: None,
            estimated_wait_time: None,
        }
    }

    #[tokio::test]
    async fn test_load_stations_requires_email() {
        let server = MockQueueServer::start().await;
        let join = workflow(&server, &MemorySessionStore::new(), &RecordingNavigator::new());

        let result = join.load_stations(&JoinForm::new("  ", Purpose::Payment)).await;

        assert_matches!(result, Err(StatusError::MissingPrecondition(_)));
        assert_eq!(server.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_load_stations_normalizes_wrapped_response() {
        let server = MockQueueServer::start().await;
        server
            .mock_stations_wrapped(
                "clinic",
                json!([{ "id": "st-1", "name": "Clinic A", "type": "clinic" }]),
            )
            .await;
        let join = workflow(&server, &MemorySessionStore::with_token("sess-1"), &RecordingNavigator::new());

        let stations = join
            .load_stations(&JoinForm::new("a@b.c", Purpose::Clinic))
            .await
            .unwrap();

        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].id.as_deref(), Some("st-1"));
    }

    #[tokio::test]
    async fn test_join_without_session_is_rejected_locally() {
        let server = MockQueueServer::start().await;
        let navigator = RecordingNavigator::new();
        let join = workflow(&server, &MemorySessionStore::new(), &navigator);

        let result = join
            .join(&JoinForm::new("a@b.c", Purpose::Payment), &station(Some("st-1")))
            .await;

        assert_matches!(result, Err(StatusError::MissingPrecondition(msg)) if msg == MISSING_SESSION);
        assert!(navigator.routes().is_empty());
        assert_eq!(server.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_join_without_station_id_is_rejected_locally() {
        let server = MockQueueServer::start().await;
        let join = workflow(&server, &MemorySessionStore::with_token("sess-1"), &RecordingNavigator::new());

        let result = join
            .join(&JoinForm::new("a@b.c", Purpose::Payment), &station(None))
            .await;

        assert_matches!(result, Err(StatusError::MissingPrecondition(msg)) if msg == MISSING_STATION);
        assert_eq!(server.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_join_persists_rotated_session_and_navigates() {
        let server = MockQueueServer::start().await;
        server.mock_join(Some("sess-2")).await;
        let store = MemorySessionStore::with_token("sess-1");
        let navigator = RecordingNavigator::new();
        let join = workflow(&server, &store, &navigator);

        let route = join
            .join(&JoinForm::new(" a@b.c ", Purpose::Payment), &station(Some("st-1")))
            .await
            .unwrap();

        assert_eq!(route, Route::Status);
        assert_eq!(store.read().unwrap().as_str(), "sess-2");
        assert_eq!(store.writes().last(), Some(&WEEK));
        assert_eq!(navigator.routes(), vec![Route::Status]);
    }

    #[tokio::test]
    async fn test_second_join_while_one_is_in_flight_is_rejected() {
        let server = MockQueueServer::start().await;
        server
            .mock_join_delayed(None, Duration::from_millis(200))
            .await;
        let navigator = RecordingNavigator::new();
        let join = workflow(&server, &MemorySessionStore::with_token("sess-1"), &navigator);
        let form = JoinForm::new("a@b.c", Purpose::Payment);
        let target = station(Some("st-1"));

        let (first, second) = tokio::join!(join.join(&form, &target), join.join(&form, &target));

        assert_matches!(first, Ok(Route::Status));
        assert_matches!(second, Err(StatusError::InFlight("Join")));
        assert_eq!(server.requests_to("/queues/join").await, 1);
        assert_eq!(navigator.routes(), vec![Route::Status]);
    }

    #[tokio::test]
    async fn test_join_failure_surfaces_server_message() {
        let server = MockQueueServer::start().await;
        server.mock_join_failure(409, "You are already in a queue").await;
        let navigator = RecordingNavigator::new();
        let join = workflow(&server, &MemorySessionStore::with_token("sess-1"), &navigator);

        let err = join
            .join(&JoinForm::new("a@b.c", Purpose::Payment), &station(Some("st-1")))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "You are already in a queue");
        assert!(navigator.routes().is_empty());
    }
}
