//! `sessionId` cookie encoding
//!
//! Values are percent-encoded as URI components: a space is `%20` and a
//! literal `+` stays a plus when read back.
//!
//! One cookie line: `sessionId=<url-encoded>; Path=/; Max-Age=<secs>;
//! SameSite=Lax; Expires=<http-date>`. `Expires` carries the absolute expiry
//! so the line can be re-read later; `Max-Age=0` deletes.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use super::{SessionToken, SESSION_COOKIE_NAME};
use crate::error::{StatusError, StatusResult};

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// A parsed or to-be-written session cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub token: Option<SessionToken>,
    pub max_age_secs: u64,
    pub expires_at: DateTime<Utc>,
}

impl SessionCookie {
    /// Cookie persisting `token` for `ttl` from `now`
    ///
    /// Fails when `now + ttl` is not a representable date.
    pub fn issue(token: &SessionToken, ttl: Duration, now: DateTime<Utc>) -> StatusResult<Self> {
        let out_of_range = || StatusError::SessionTtl(ttl.as_secs());
        let delta = chrono::Duration::from_std(ttl).map_err(|_| out_of_range())?;
        let expires_at = now.checked_add_signed(delta).ok_or_else(out_of_range)?;
        Ok(Self {
            token: Some(token.clone()),
            max_age_secs: ttl.as_secs(),
            expires_at,
        })
    }

    /// Deletion cookie: empty value, max-age zero
    pub fn expired(now: DateTime<Utc>) -> Self {
        Self {
            token: None,
            max_age_secs: 0,
            expires_at: now,
        }
    }

    /// Token, if present and not expired at `now`
    pub fn live_token(&self, now: DateTime<Utc>) -> Option<SessionToken> {
        if self.max_age_secs == 0 || self.expires_at <= now {
            return None;
        }
        self.token.clone()
    }

    /// Render as a `Set-Cookie`-style line
    pub fn to_line(&self) -> String {
        let value: String = self
            .token
            .as_ref()
            .map(|t| urlencoding::encode(t.as_str()).into_owned())
            .unwrap_or_default();
        format!(
            "{}={}; Path=/; Max-Age={}; SameSite=Lax; Expires={}",
            SESSION_COOKIE_NAME,
            value,
            self.max_age_secs,
            self.expires_at.format(HTTP_DATE_FORMAT)
        )
    }

    /// Parse a cookie line; `None` when it is not a well-formed session cookie
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split(';').map(str::trim);
        let (name, raw_value) = parts.next()?.split_once('=')?;
        if name != SESSION_COOKIE_NAME {
            return None;
        }

        let mut max_age_secs = None;
        let mut expires_at = None;
        for attribute in parts {
            let (key, value) = attribute.split_once('=').unwrap_or((attribute, ""));
            match key.to_ascii_lowercase().as_str() {
                "max-age" => max_age_secs = value.parse::<u64>().ok(),
                "expires" => {
                    expires_at = NaiveDateTime::parse_from_str(value, HTTP_DATE_FORMAT)
                        .ok()
                        .map(|naive| Utc.from_utc_datetime(&naive))
                }
                _ => {}
            }
        }

        Some(Self {
            token: decode_value(raw_value),
            max_age_secs: max_age_secs?,
            expires_at: expires_at?,
        })
    }
}

fn decode_value(raw: &str) -> Option<SessionToken> {
    let decoded = urlencoding::decode(raw).ok()?;
    SessionToken::new(decoded.into_owned())
}
