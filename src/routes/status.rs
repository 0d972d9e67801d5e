//! Root status endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::CRATE_VERSION;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub service: String,
    pub status: &'static str,
    pub version: &'static str,
}

/// Static service descriptor. Touches nothing but configuration.
pub async fn index(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        service: state.config.service.name.clone(),
        status: "running",
        version: CRATE_VERSION,
    })
}
