//! Health check endpoint for container orchestration.
//!
//! `/health` attempts one database round trip and reports `healthy` or
//! `degraded`. It always answers 200: the process is alive even when the
//! database is not, and an orchestrator should not restart it for that.

use std::time::Duration;

use axum::{
    extract::State,
    http::header::{HeaderValue, CACHE_CONTROL},
    response::IntoResponse,
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::instrument;

use crate::config::CACHE_CONTROL_HEALTH;
use crate::state::AppState;
use crate::store::{DataStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Body of a `/health` response. Computed per request, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Seconds since process start
    pub uptime: f64,
    /// RFC 3339 UTC time the report was generated
    pub timestamp: String,
}

/// Ping the store once, bounded by `timeout`.
pub async fn check(store: &dyn DataStore, timeout: Duration) -> Result<(), StoreError> {
    match tokio::time::timeout(timeout, store.ping()).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

/// Run `check` and fold the outcome into a status. Any failure means `Degraded`.
pub async fn probe(store: &dyn DataStore, timeout: Duration) -> HealthStatus {
    match check(store, timeout).await {
        Ok(()) => HealthStatus::Healthy,
        Err(e @ StoreError::Timeout(_)) => {
            tracing::warn!(error = %e, "Health probe timed out");
            HealthStatus::Degraded
        }
        Err(e) => {
            tracing::error!(error = %e, "Health probe failed");
            HealthStatus::Degraded
        }
    }
}

/// Health check handler.
#[instrument(name = "health::health", skip(state))]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = probe(state.store.as_ref(), state.config.database.probe_timeout()).await;

    let report = HealthReport {
        status,
        uptime: state.uptime().as_secs_f64(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    (
        [(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_HEALTH))],
        Json(report),
    )
}
