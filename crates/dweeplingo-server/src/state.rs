//! Application state management

use dweeplingo_core::{ModelRegistry, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    /// Bounds the number of translations running on the blocking pool.
    pub limiter: Arc<Semaphore>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(registry: ModelRegistry, config: &ServerConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            limiter: Arc::new(Semaphore::new(config.max_concurrent_translations.max(1))),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}
