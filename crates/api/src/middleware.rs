use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use gatehouse_auth::{Credential, DEV_AUTH_HEADER, StrategyKind};

use crate::app::AppState;
use crate::app::errors::ApiError;
use crate::context::{RequestContext, TraceId};

/// Authenticate every matched route (public ones pass untouched).
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let access = state.catalog.access(req.uri().path());
    let mut ctx = take_context(&mut req);

    state
        .guard
        .authenticate(&mut ctx, access, req.headers())
        .await?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// Resolve the workspace for tenant-scoped routes.
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let mut ctx = take_context(&mut req);

    state.tenants.resolve(&mut ctx, req.headers()).await?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// Context is detached while a guard works on it and re-attached only on
/// success, so a rejected or cancelled request never carries partial state.
fn take_context(req: &mut Request) -> RequestContext {
    req.extensions_mut()
        .remove::<RequestContext>()
        .unwrap_or_else(|| RequestContext::new(TraceId::generate()))
}

/// Pull the credential the active strategy expects; other headers are ignored.
pub(crate) fn extract_credential(kind: StrategyKind, headers: &HeaderMap) -> Option<Credential> {
    match kind {
        StrategyKind::Token => extract_bearer(headers).map(|t| Credential::Bearer(t.to_string())),
        StrategyKind::SharedSecret => headers
            .get(DEV_AUTH_HEADER)
            .filter(|v| !v.is_empty())
            .map(|v| Credential::DevToken(String::from_utf8_lossy(v.as_bytes()).into_owned())),
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
