//! HTTP route handlers.
//!
//! Two endpoints: `/` returns a static service descriptor and `/health`
//! reports database reachability. Anything else falls through to a JSON 404.
//!
//! Request tracing is enabled via middleware that assigns a request ID to
//! each incoming request, allowing correlation of all logs within a request.

pub mod health;
pub mod status;

use axum::{http::Method, http::Uri, middleware, routing::get, Router};
use http::header::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Build the CORS policy for the configured environment.
///
/// Outside production any origin is allowed. In production only the
/// configured origins are (`*` allows any), and an empty list disables
/// cross-origin access.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::HEAD, Method::OPTIONS]);

    let wildcard = config.http.cors_origins.iter().any(|origin| origin == "*");
    if !config.environment.is_production() || wildcard {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .http
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

/// Creates the Axum router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let body_limit = state.config.http.body_limit_bytes;

    Router::new()
        .route("/", get(status::index))
        .route("/health", get(health::health))
        .fallback(not_found)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}

