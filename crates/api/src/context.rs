//! Per-request context.
//!
//! One [`RequestContext`] lives in the request extensions from the moment the
//! correlation middleware runs until the response is produced. Guards mutate
//! it in place; handlers read it through the extractors below.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use serde::Serialize;
use uuid::Uuid;

use gatehouse_auth::{MembershipRole, Principal};
use gatehouse_core::TenantId;

use crate::app::errors::ApiError;

/// Opaque per-request correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(String);

impl TraceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TraceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl core::fmt::Display for TraceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Workspace the request is scoped to, with the caller's role in it.
///
/// Only the tenant resolver constructs this, and only after a membership
/// lookup for `(principal, tenant)` succeeded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantContext {
    #[serde(rename = "workspaceId")]
    tenant_id: TenantId,
    role: MembershipRole,
}

impl TenantContext {
    pub(crate) fn new(tenant_id: TenantId, role: MembershipRole) -> Self {
        Self { tenant_id, role }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn role(&self) -> MembershipRole {
        self.role
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    trace_id: TraceId,
    principal: Option<Principal>,
    tenant: Option<TenantContext>,
}

impl RequestContext {
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            principal: None,
            tenant: None,
        }
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn tenant(&self) -> Option<&TenantContext> {
        self.tenant.as_ref()
    }

    /// Attach the authenticated principal.
    ///
    /// A principal, once attached, is never replaced; returns `false` if one
    /// was already present.
    pub fn attach_principal(&mut self, principal: Principal) -> bool {
        if self.principal.is_some() {
            return false;
        }
        self.principal = Some(principal);
        true
    }

    pub(crate) fn attach_tenant(&mut self, tenant: TenantContext) {
        self.tenant = Some(tenant);
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| ApiError::Unexpected(anyhow::anyhow!("request context missing")))
    }
}

/// The authenticated caller. Rejects with 401 when no principal is attached.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.principal().cloned())
            .map(CurrentPrincipal)
            .ok_or_else(|| ApiError::http(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

/// The resolved workspace.
///
/// Missing context on a tenant-scoped route means the route was wired
/// without the tenant layer; that fails closed as a server error.
#[derive(Debug, Copy, Clone)]
pub struct CurrentWorkspace(pub TenantContext);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentWorkspace
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.tenant().copied())
            .map(CurrentWorkspace)
            .ok_or_else(|| {
                ApiError::http(StatusCode::INTERNAL_SERVER_ERROR, "Workspace context missing")
            })
    }
}
