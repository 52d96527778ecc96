//! Auth-only routes: identity required, no workspace header, because a user
//! may belong to several workspaces.

use axum::{Json, Router, extract::State, routing::get};

use gatehouse_core::{DomainError, error_types};

use crate::app::AppState;
use crate::app::dto::{MeResponse, MembershipDto, UserDto, WorkspaceListItem};
use crate::app::errors::ApiError;
use crate::context::CurrentPrincipal;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/workspaces", get(workspaces))
}

pub async fn me(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<MeResponse>, ApiError> {
    let user = state
        .principals
        .find_principal_by_id(principal.id())
        .await?
        .ok_or_else(|| DomainError::not_found(error_types::USER_NOT_FOUND, "User not found"))?;

    let memberships = state.memberships.list_memberships(user.id).await?;

    Ok(Json(MeResponse {
        user: UserDto::from(&user),
        memberships: memberships.into_iter().map(MembershipDto::from).collect(),
    }))
}

pub async fn workspaces(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<WorkspaceListItem>>, ApiError> {
    let memberships = state.memberships.list_memberships(principal.id()).await?;
    Ok(Json(
        memberships.into_iter().map(WorkspaceListItem::from).collect(),
    ))
}
