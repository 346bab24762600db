//! Cookie-file session store

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use super::{SessionCookie, SessionStore, SessionToken, SESSION_COOKIE_NAME};
use crate::error::StatusResult;

/// Session store persisting one `sessionId` cookie line in a file
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, cookie: &SessionCookie) -> StatusResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format!("{}\n", cookie.to_line()))?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn read(&self) -> Option<SessionToken> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable session file");
                return None;
            }
        };

        let prefix = format!("{}=", SESSION_COOKIE_NAME);
        let cookie = contents
            .lines()
            .find(|line| line.trim_start().starts_with(&prefix))
            .and_then(SessionCookie::parse);

        match cookie {
            Some(cookie) => cookie.live_token(Utc::now()),
            None => {
                debug!(path = %self.path.display(), "No well-formed session cookie");
                None
            }
        }
    }

    fn write(&self, token: &SessionToken, ttl: Duration) -> StatusResult<()> {
        self.persist(&SessionCookie::issue(token, ttl, Utc::now())?)?;
        debug!(path = %self.path.display(), ttl_secs = ttl.as_secs(), "Session cookie written");
        Ok(())
    }

    fn clear(&self) -> StatusResult<()> {
        self.persist(&SessionCookie::expired(Utc::now()))?;
        debug!(path = %self.path.display(), "Session cookie cleared");
        Ok(())
    }
}
