//! Tenant (workspace) resolution.
//!
//! Reads `x-workspace-id`, validates its shape, and checks membership for
//! `(principal, workspace)` with exactly one store lookup. Missing/malformed
//! headers are client-input errors (422); everything else fails closed as a
//! uniform 403 that never reveals whether the workspace exists.

use std::sync::{Arc, LazyLock};

use axum::http::{HeaderMap, StatusCode};
use regex::Regex;
use tracing::{debug, warn};

use gatehouse_auth::MembershipStore;
use gatehouse_core::{ErrorCode, TenantId};

use crate::app::errors::ApiError;
use crate::context::{RequestContext, TenantContext};

pub const WORKSPACE_HEADER: &str = "x-workspace-id";

const HEADER_MISSING: &str = "Missing required header: x-workspace-id";
const HEADER_MALFORMED: &str = "Invalid x-workspace-id format";
const FORBIDDEN: &str = "Workspace access forbidden";

/// UUID versions 1 through 5, any case.
static WORKSPACE_ID_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
});

/// Shape check for workspace ids. Fails closed if the pattern is unusable.
pub fn is_workspace_id(value: &str) -> bool {
    WORKSPACE_ID_PATTERN
        .as_ref()
        .is_ok_and(|re| re.is_match(value))
}

/// Parse the workspace header: trimmed, blank counts as absent.
pub fn parse_workspace_header(headers: &HeaderMap) -> Result<TenantId, ApiError> {
    let Some(raw) = headers.get(WORKSPACE_HEADER) else {
        return Err(header_required(HEADER_MISSING));
    };
    let value = raw
        .to_str()
        .map_err(|_| header_required(HEADER_MALFORMED))?
        .trim();

    if value.is_empty() {
        return Err(header_required(HEADER_MISSING));
    }
    if !is_workspace_id(value) {
        return Err(header_required(HEADER_MALFORMED));
    }

    value
        .parse::<TenantId>()
        .map_err(|_| header_required(HEADER_MALFORMED))
}

fn header_required(message: &'static str) -> ApiError {
    ApiError::http_with_code(
        StatusCode::UNPROCESSABLE_ENTITY,
        message,
        ErrorCode::WorkspaceHeaderRequired,
    )
}

fn forbidden() -> ApiError {
    ApiError::http_with_code(StatusCode::FORBIDDEN, FORBIDDEN, ErrorCode::WorkspaceForbidden)
}

#[derive(Clone)]
pub struct TenantResolver {
    memberships: Arc<dyn MembershipStore>,
}

impl TenantResolver {
    pub fn new(memberships: Arc<dyn MembershipStore>) -> Self {
        Self { memberships }
    }

    /// Resolve and attach the tenant context.
    ///
    /// Nothing is attached unless the membership lookup succeeds.
    pub async fn resolve(
        &self,
        ctx: &mut RequestContext,
        headers: &HeaderMap,
    ) -> Result<TenantContext, ApiError> {
        let tenant_id = parse_workspace_header(headers)?;

        let Some(principal) = ctx.principal() else {
            warn!(tenant_id = %tenant_id, "tenant resolution reached without a principal");
            return Err(forbidden());
        };
        let user_id = principal.id();

        let role = self
            .memberships
            .find_membership(user_id, tenant_id)
            .await?
            .ok_or_else(|| {
                debug!(user_id = %user_id, tenant_id = %tenant_id, "no membership for workspace");
                forbidden()
            })?;

        let tenant = TenantContext::new(tenant_id, role);
        ctx.attach_tenant(tenant);
        Ok(tenant)
    }
}
