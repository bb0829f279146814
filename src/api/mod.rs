pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::error::{AppError, Result};
use crate::ml::InferenceEngine;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InferenceEngine>,
    pub started_at: Instant,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(engine: Arc<InferenceEngine>) -> Self {
        Self {
            engine,
            started_at: Instant::now(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Run an engine call on the blocking thread pool
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&InferenceEngine) -> T + Send + 'static,
        T: Send + 'static,
    {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| AppError::Internal(format!("inference task failed: {}", e)))
    }
}
