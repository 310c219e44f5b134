//! Liveness probe

use axum::http::StatusCode;

/// Handler for the `GET /healthz` endpoint
pub async fn handler() -> StatusCode {
    StatusCode::OK
}
