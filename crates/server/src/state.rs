//! Application state shared across handlers.

use sluice_backend::Services;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Backend services: access policy, lease store, receiver pool.
    pub services: Arc<Services>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}
