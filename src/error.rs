use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors rendered as JSON responses.
///
/// The health and root handlers never fail; this covers requests that match
/// no route.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(error = %self, "Request rejected");

        let body = json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
