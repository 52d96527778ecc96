//! Tenant-scoped routes: identity and `x-workspace-id` membership required.

use axum::{Json, Router, routing::get};

use crate::app::AppState;
use crate::context::{CurrentWorkspace, TenantContext};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/tenant/ping", get(ping))
}

/// Echo the resolved workspace and the caller's role in it.
pub async fn ping(CurrentWorkspace(tenant): CurrentWorkspace) -> Json<TenantContext> {
    Json(tenant)
}
