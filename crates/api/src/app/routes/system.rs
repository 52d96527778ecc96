use axum::{
    Json, Router,
    http::{Method, StatusCode, Uri},
    routing::get,
};

use crate::app::AppState;
use crate::app::dto::HealthResponse;
use crate::app::errors::ApiError;
use crate::guard::HEALTH_PATH;

pub fn router() -> Router<AppState> {
    Router::new().route(HEALTH_PATH, get(health))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Fallback for unmatched routes.
pub async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::http(
        StatusCode::NOT_FOUND,
        format!("Cannot {method} {}", uri.path()),
    )
}
