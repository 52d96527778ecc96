//! Application error model.
//!
//! [`DomainError`] is the explicitly typed error raised by business logic. It
//! carries everything the HTTP layer needs to render a problem-details body
//! (type, title, status, safe detail, optional stable code) plus internal-only
//! metadata and cause that never reach clients unless debug output is enabled.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result type used by business logic.
pub type DomainResult<T> = Result<T, DomainError>;

/// Well-known error `type` values.
///
/// Types are namespaced (`<area>.<kind>`) for human/log grouping. Clients
/// should branch on [`ErrorCode`] instead.
pub mod error_types {
    pub const AUTH_INVALID_CREDENTIALS: &str = "auth.invalidCredentials";
    pub const AUTH_UNAUTHORIZED: &str = "auth.unauthorized";
    pub const AUTH_FORBIDDEN: &str = "auth.forbidden";
    pub const USER_NOT_FOUND: &str = "user.notFound";
    pub const INTERNAL_UNEXPECTED: &str = "internal.unexpected";
    pub const REQUEST_BAD: &str = "request.badRequest";
    pub const REQUEST_UNAUTHORIZED: &str = "request.unauthorized";
    pub const REQUEST_FORBIDDEN: &str = "request.forbidden";
    pub const REQUEST_NOT_FOUND: &str = "request.notFound";
}

/// Stable machine-readable failure codes.
///
/// Unlike the route-scoped `type`, a code means the same thing on every
/// endpoint. The wire spelling is part of the client contract.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Tenant header missing or not a valid identifier.
    WorkspaceHeaderRequired,
    /// No membership exists for the (principal, tenant) pair.
    WorkspaceForbidden,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkspaceHeaderRequired => "WORKSPACE_HEADER_REQUIRED",
            Self::WorkspaceForbidden => "WORKSPACE_FORBIDDEN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicitly typed application error.
#[derive(Debug, Clone)]
pub struct DomainError {
    error_type: Cow<'static, str>,
    title: Cow<'static, str>,
    status: u16,
    detail: Option<String>,
    code: Option<ErrorCode>,
    meta: Map<String, Value>,
    cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl DomainError {
    pub fn new(
        error_type: impl Into<Cow<'static, str>>,
        title: impl Into<Cow<'static, str>>,
        status: u16,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            title: title.into(),
            status,
            detail: None,
            code: None,
            meta: Map::new(),
            cause: None,
        }
    }

    /// `404` with the given type and title.
    pub fn not_found(
        error_type: impl Into<Cow<'static, str>>,
        title: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::new(error_type, title, 404)
    }

    /// Client-safe human-readable detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Internal metadata. Logged server-side, exposed only in debug output.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn error_type(&self) -> &str {
        &self.error_type
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Safe detail; falls back to the title when none was given.
    pub fn detail(&self) -> &str {
        self.detail.as_deref().unwrap_or(&self.title)
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.detail())
    }
}

impl StdError for DomainError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}
