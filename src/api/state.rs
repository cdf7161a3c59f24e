use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::execution::ExecutionEngine;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ExecutionEngine>,

    /// Bearer token for execution requests (None = open)
    pub api_token: Option<Arc<str>>,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: Arc<ExecutionEngine>) -> Self {
        let api_token = engine.config().server.api_token.as_deref().map(Arc::from);
        Self {
            engine,
            api_token,
            start_time: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds().max(0)
    }
}
