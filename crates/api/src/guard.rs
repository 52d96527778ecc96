//! Identity guard.

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use tracing::{debug, warn};

use gatehouse_auth::{CredentialStrategy, CredentialVerifier, StrategyKind, VerificationError};

use crate::app::errors::ApiError;
use crate::context::RequestContext;
use crate::middleware::extract_credential;

pub const HEALTH_PATH: &str = "/api/health";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Authenticated,
}

/// Explicit per-route access tags, resolved by exact path before the guard
/// runs. Anything not listed requires authentication.
#[derive(Debug, Clone, Default)]
pub struct RouteCatalog {
    public: HashSet<String>,
}

impl RouteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_public(mut self, path: impl Into<String>) -> Self {
        self.public.insert(path.into());
        self
    }

    pub fn access(&self, path: &str) -> RouteAccess {
        if self.public.contains(path) {
            RouteAccess::Public
        } else {
            RouteAccess::Authenticated
        }
    }

    /// The catalog served by the application router.
    pub fn standard() -> Self {
        Self::new().with_public(HEALTH_PATH)
    }
}

/// Runs the configured credential strategy and attaches the principal.
#[derive(Clone)]
pub struct IdentityGuard {
    strategy: Arc<CredentialStrategy>,
}

impl IdentityGuard {
    pub fn new(strategy: CredentialStrategy) -> Self {
        Self {
            strategy: Arc::new(strategy),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Authenticate the request in place.
    ///
    /// Public routes pass with no principal. A principal attached by an
    /// earlier stage short-circuits verification, so running the guard twice
    /// is a no-op.
    pub async fn authenticate(
        &self,
        ctx: &mut RequestContext,
        access: RouteAccess,
        headers: &HeaderMap,
    ) -> Result<(), ApiError> {
        if access == RouteAccess::Public {
            return Ok(());
        }
        if ctx.principal().is_some() {
            debug!("principal already attached; skipping verification");
            return Ok(());
        }

        let credential = extract_credential(self.kind(), headers);
        let principal = self
            .strategy
            .verify(credential.as_ref())
            .await
            .map_err(|err| match err {
                VerificationError::InvalidCredential(reason) => {
                    warn!(reason, strategy = ?self.kind(), "authentication failed");
                    ApiError::http(StatusCode::UNAUTHORIZED, reason)
                }
                VerificationError::Lookup(err) => ApiError::from(err),
            })?;

        debug!(user_id = %principal.id(), "principal attached");
        ctx.attach_principal(principal);
        Ok(())
    }
}
