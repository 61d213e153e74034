//! Application state for the API server.

use std::sync::Arc;
use std::time::Instant;

use triagebot_coordinator::Orchestrator;

/// Shared state handed to every handler.
pub struct AppState {
    /// Pipeline used for every accepted delivery
    pub orchestrator: Arc<Orchestrator>,

    pub app_name: String,

    /// Reported on the health endpoint
    pub llm_model: String,

    pub embedding_enabled: bool,

    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        app_name: impl Into<String>,
        llm_model: impl Into<String>,
        embedding_enabled: bool,
    ) -> Self {
        Self {
            orchestrator,
            app_name: app_name.into(),
            llm_model: llm_model.into(),
            embedding_enabled,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
