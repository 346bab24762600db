//! Queue service request and response models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Reason a visitor is queueing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Payment,
    Registrar,
    Clinic,
    Auditing,
}

impl Purpose {
    /// All purposes, in the order the join form offers them
    pub const ALL: [Purpose; 4] = [
        Purpose::Payment,
        Purpose::Registrar,
        Purpose::Clinic,
        Purpose::Auditing,
    ];

    /// Wire value used in query strings and documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Payment => "payment",
            Purpose::Registrar => "registrar",
            Purpose::Clinic => "clinic",
            Purpose::Auditing => "auditing",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Purpose::Payment => "Payment",
            Purpose::Registrar => "Registrar",
            Purpose::Clinic => "Clinic",
            Purpose::Auditing => "Auditing",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a string names no known purpose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPurpose(pub String);

impl fmt::Display for UnknownPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown purpose '{}'", self.0)
    }
}

impl std::error::Error for UnknownPurpose {}

impl FromStr for Purpose {
    type Err = UnknownPurpose;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Purpose::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPurpose(s.to_string()))
    }
}

/// A service point a visitor can join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    /// Document id; missing ids make a station unjoinable
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    /// Purpose the station serves; unknown values are dropped
    #[serde(rename = "type", default, deserialize_with = "lenient_purpose")]
    pub purpose: Option<Purpose>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Present when the service includes a wait estimate
    #[serde(default)]
    pub estimated_wait_time: Option<f64>,
}

fn lenient_purpose<'de, D>(deserializer: D) -> Result<Option<Purpose>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        value
            .parse()
            .map_err(|e: UnknownPurpose| {
                tracing::warn!(error = %e, "Ignoring station purpose");
            })
            .ok()
    }))
}

/// Station list as returned by the service: either a bare array or wrapped
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StationsResponse {
    List(Vec<Station>),
    Wrapped {
        #[serde(default)]
        stations: Vec<Station>,
    },
}

impl From<StationsResponse> for Vec<Station> {
    fn from(response: StationsResponse) -> Self {
        match response {
            StationsResponse::List(stations) => stations,
            StationsResponse::Wrapped { stations } => stations,
        }
    }
}

/// Body of a join request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub email: String,
    pub purpose: Purpose,
    pub qr_id: String,
    pub station_id: String,
}

/// Join response; the service may rotate the session id
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Result of exchanging a one-time access credential
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub session_id: String,
    /// Route the visitor should be sent to next
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CounterResponse {
    #[serde(default)]
    pub number: Option<CounterNumber>,
}

/// Counter numbers come back as strings or bare numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CounterNumber {
    Text(String),
    Number(serde_json::Number),
}

impl CounterResponse {
    pub(crate) fn into_label(self) -> Option<String> {
        match self.number? {
            CounterNumber::Text(text) if text.trim().is_empty() => None,
            CounterNumber::Text(text) => Some(text),
            CounterNumber::Number(number) => Some(number.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CancelRequest<'a> {
    pub reason: &'a str,
}

/// Error body the service attaches to failed responses
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorResponse {
    pub(crate) fn into_message(self) -> Option<String> {
        self.message.or(self.error).filter(|m| !m.is_empty())
    }
}
