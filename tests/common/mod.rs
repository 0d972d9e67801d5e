//! Shared test fixtures: a substitutable data store and router builders.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;

use heartbeat::config::{AppConfig, Environment};
use heartbeat::routes::create_router;
use heartbeat::state::AppState;
use heartbeat::store::{DataStore, StoreError};

const UP: u8 = 0;
const DOWN: u8 = 1;
const HUNG: u8 = 2;

/// In-memory stand-in for the database whose reachability can be flipped at runtime.
#[derive(Default)]
pub struct MockStore {
    mode: AtomicU8,
    pings: AtomicUsize,
    closes: AtomicUsize,
    close_hangs: AtomicBool,
}

impl MockStore {
    pub fn up() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn down() -> Arc<Self> {
        let store = Self::default();
        store.mode.store(DOWN, Ordering::SeqCst);
        Arc::new(store)
    }

    pub fn hung() -> Arc<Self> {
        let store = Self::default();
        store.mode.store(HUNG, Ordering::SeqCst);
        Arc::new(store)
    }

    /// Store whose `close` never completes.
    pub fn stuck_on_close() -> Arc<Self> {
        let store = Self::default();
        store.close_hangs.store(true, Ordering::SeqCst);
        Arc::new(store)
    }

    pub fn disconnect(&self) {
        self.mode.store(DOWN, Ordering::SeqCst);
    }

    pub fn reconnect(&self) {
        self.mode.store(UP, Ordering::SeqCst);
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataStore for MockStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        match self.mode.load(Ordering::SeqCst) {
            UP => Ok(()),
            DOWN => Err(StoreError::Query(sqlx::Error::PoolClosed)),
            _ => std::future::pending().await,
        }
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.close_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.environment = Environment::Test;
    config.service.name = "heartbeat-test".to_string();
    config.database.url = Some("postgres://unused".to_string());
    config.database.probe_timeout_ms = 100;
    config.database.acquire_timeout_ms = 50;
    config.http.shutdown_grace_seconds = 1;
    config
}

pub fn test_app(store: Arc<MockStore>) -> Router {
    test_app_with(test_config(), store)
}

pub fn test_app_with(config: AppConfig, store: Arc<MockStore>) -> Router {
    create_router(AppState::new(config, store))
}

/// Config for a production deployment allowing only `origins` cross-origin.
pub fn production_config(origins: &[&str]) -> AppConfig {
    let mut config = test_config();
    config.environment = Environment::Production;
    config.http.cors_origins = origins.iter().map(|origin| origin.to_string()).collect();
    config
}
