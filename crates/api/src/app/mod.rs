//! HTTP API application wiring (Axum router + pipeline layers).
//!
//! This folder is structured like:
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: response DTOs
//! - `errors.rs`: failure classification and the error normalizer
//! - `problem.rs`: the problem-details body and route-derived error types

use std::sync::Arc;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

use gatehouse_auth::{
    CredentialStrategy, MembershipStore, PrincipalDirectory, SharedSecretVerifier, TokenVerifier,
};

use crate::config::Settings;
use crate::correlation::trace_id_middleware;
use crate::guard::{IdentityGuard, RouteCatalog};
use crate::middleware::{identity_middleware, tenant_middleware};
use crate::tenancy::TenantResolver;

use errors::{ErrorNormalizer, normalize_errors, panic_to_failure};

pub mod dto;
pub mod errors;
pub mod problem;
pub mod routes;

/// Shared, read-only per-process state.
#[derive(Clone)]
pub struct AppState {
    pub(crate) guard: IdentityGuard,
    pub(crate) tenants: TenantResolver,
    pub(crate) catalog: Arc<RouteCatalog>,
    pub(crate) principals: Arc<dyn PrincipalDirectory>,
    pub(crate) memberships: Arc<dyn MembershipStore>,
    pub(crate) normalizer: ErrorNormalizer,
}

impl AppState {
    /// Select the credential strategy once, from configuration.
    pub fn new<D>(settings: &Settings, directory: Arc<D>) -> Self
    where
        D: PrincipalDirectory + MembershipStore + 'static,
    {
        let principals: Arc<dyn PrincipalDirectory> = directory.clone();
        let memberships: Arc<dyn MembershipStore> = directory;

        let strategy = match &settings.dev_auth {
            Some(dev) => CredentialStrategy::SharedSecret(SharedSecretVerifier::new(
                dev.token.clone(),
                dev.operator_email.clone(),
                principals.clone(),
            )),
            None => CredentialStrategy::Token(TokenVerifier::new(
                settings.jwt_secret.as_bytes(),
                principals.clone(),
            )),
        };

        Self {
            guard: IdentityGuard::new(strategy),
            tenants: TenantResolver::new(memberships.clone()),
            catalog: Arc::new(RouteCatalog::standard()),
            principals,
            memberships,
            normalizer: ErrorNormalizer::new(settings.debug),
        }
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app<D>(settings: &Settings, directory: Arc<D>) -> Router
where
    D: PrincipalDirectory + MembershipStore + 'static,
{
    assemble(AppState::new(settings, directory), Router::new(), Router::new())
}

/// Assemble the router with extra route groups.
///
/// `authenticated` routes get the identity guard; `tenant_scoped` routes get
/// the identity guard and the tenant resolver.
pub fn assemble(
    state: AppState,
    authenticated: Router<AppState>,
    tenant_scoped: Router<AppState>,
) -> Router {
    let normalizer = state.normalizer;

    let tenant_scoped = routes::tenant::router()
        .merge(tenant_scoped)
        .route_layer(from_fn_with_state(state.clone(), tenant_middleware));

    Router::new()
        .merge(routes::system::router())
        .merge(routes::me::router())
        .merge(authenticated)
        .merge(tenant_scoped)
        .route_layer(from_fn_with_state(state.clone(), identity_middleware))
        .fallback(routes::system::not_found)
        .with_state(state)
        // Outermost first: correlation, then the normalizer, then panic capture.
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(trace_id_middleware))
                .layer(from_fn_with_state(normalizer, normalize_errors))
                .layer(CatchPanicLayer::custom(panic_to_failure)),
        )
}
