//! Shared application state for request handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::store::DataStore;

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Built once at startup. Holds the configuration, the single data store
/// handle used for the whole process lifetime, and the monotonic start time
/// that uptime is measured from.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DataStore>,
    started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DataStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            started_at: Instant::now(),
        }
    }

    /// Time elapsed since the state was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
