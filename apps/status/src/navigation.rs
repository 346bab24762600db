//! Navigation boundary
//!
//! Routing itself is external; components only announce where the visitor
//! should go next.

use std::sync::{Arc, Mutex};

use tracing::info;

/// Destinations the engine can send a visitor to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Join form (`/form`)
    Join,
    /// Live ticket status (`/queue`)
    Status,
    /// Session rejected (`/unauthorized`)
    Unauthorized,
    /// Any other server-provided path
    Path(String),
}

impl Route {
    pub fn path(&self) -> &str {
        match self {
            Route::Join => "/form",
            Route::Status => "/queue",
            Route::Unauthorized => "/unauthorized",
            Route::Path(path) => path,
        }
    }

    /// Map a path onto a known route where possible
    pub fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/form" => Route::Join,
            "/queue" => Route::Status,
            "/unauthorized" => Route::Unauthorized,
            _ => Route::Path(path.to_string()),
        }
    }
}

/// Receives navigation requests
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that only logs the destination
#[derive(Debug, Clone, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: Route) {
        info!(path = route.path(), "Navigate");
    }
}

/// Navigator that records every request, in order
#[derive(Debug, Clone, Default)]
pub struct RecordingNavigator {
    routes: Arc<Mutex<Vec<Route>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last(&self) -> Option<Route> {
        self.routes().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(route);
    }
}
