//! Failure classification and the error normalizer.
//!
//! Handlers, extractors and guards return [`ApiError`]. Its `IntoResponse`
//! impl never renders a body: it produces a bare status response carrying
//! the failure in a [`FailureSlot`] extension. [`normalize_errors`] sits
//! near the top of the stack, knows the request path and trace id, and turns
//! every failed response (including framework rejections and caught panics)
//! into one [`ProblemDetails`] body.

use std::any::Any;
use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{error, warn};

use gatehouse_auth::DirectoryError;
use gatehouse_core::{DomainError, ErrorCode, error_types};

use super::problem::{ProblemDetails, derive_error_type, status_title};
use crate::context::{RequestContext, TraceId};

const GENERIC_DETAIL: &str = "Unexpected error occurred";
const REJECTION_BODY_LIMIT: usize = 16 * 1024;

/// A failure known only by status and a client-safe message.
#[derive(Debug, Clone, Error)]
#[error("{status}: {message}")]
pub struct HttpFailure {
    pub status: StatusCode,
    pub message: Cow<'static, str>,
    pub code: Option<ErrorCode>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Explicitly typed application error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Transport-level failure (guards, framework rejections).
    #[error(transparent)]
    Http(HttpFailure),

    /// Anything else. Always a 500 with a generic body.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl ApiError {
    pub fn http(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self::Http(HttpFailure {
            status,
            message: message.into(),
            code: None,
        })
    }

    pub fn http_with_code(
        status: StatusCode,
        message: impl Into<Cow<'static, str>>,
        code: ErrorCode,
    ) -> Self {
        Self::Http(HttpFailure {
            status,
            message: message.into(),
            code: Some(code),
        })
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Domain(e) => response_status(e.status()),
            Self::Http(f) => f.status,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine code carried by the failure, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Domain(e) => e.code(),
            Self::Http(f) => f.code,
            Self::Unexpected(e) => e
                .chain()
                .find_map(|cause| cause.downcast_ref::<DomainError>())
                .and_then(DomainError::code),
        }
    }
}

/// Statuses outside `100..=599` cannot be sent as-is and become a 500.
fn response_status(status: u16) -> StatusCode {
    match status {
        100..=599 => StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Store failures are never credential failures.
impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        Self::Unexpected(anyhow::Error::new(err))
    }
}

/// Carries a failure from the response back up to the normalizer.
#[derive(Clone)]
pub struct FailureSlot(pub(crate) Arc<ApiError>);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        response.extensions_mut().insert(FailureSlot(Arc::new(self)));
        response
    }
}

/// Turns failures into [`ProblemDetails`].
///
/// Server-side logging is unconditional; `debug` only controls whether the
/// internal block is included in the response body.
#[derive(Debug, Copy, Clone, Default)]
pub struct ErrorNormalizer {
    debug: bool,
}

impl ErrorNormalizer {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn normalize(&self, err: &ApiError, instance: &str, trace_id: &TraceId) -> ProblemDetails {
        match err {
            ApiError::Domain(e) => self.domain(e, instance, trace_id),
            ApiError::Http(f) => self.http(f, instance, trace_id),
            ApiError::Unexpected(e) => self.unexpected(e, err.code(), instance, trace_id),
        }
    }

    fn domain(&self, e: &DomainError, instance: &str, trace_id: &TraceId) -> ProblemDetails {
        let status = response_status(e.status()).as_u16();
        let causes = source_chain(e);
        warn!(
            error_type = e.error_type(),
            status,
            declared_status = e.status(),
            trace_id = %trace_id,
            code = ?e.code(),
            meta = %serde_json::Value::Object(e.meta().clone()),
            causes = ?causes,
            "{}",
            e.title()
        );

        let debug = self.debug.then(|| {
            let mut block = Map::new();
            block.insert("message".into(), json!(e.to_string()));
            if !causes.is_empty() {
                block.insert("cause".into(), json!(causes));
            }
            if !e.meta().is_empty() {
                block.insert("meta".into(), Value::Object(e.meta().clone()));
            }
            Value::Object(block)
        });

        ProblemDetails::new(e.error_type(), e.title(), status, instance, trace_id)
            .with_code(e.code())
            .with_detail(e.detail())
            .with_debug(debug)
    }

    fn http(&self, f: &HttpFailure, instance: &str, trace_id: &TraceId) -> ProblemDetails {
        let status = f.status.as_u16();
        let error_type = derive_error_type(instance, status);
        let title = status_title(status);

        warn!(
            error_type = %error_type,
            status,
            trace_id = %trace_id,
            code = ?f.code,
            message = %f.message,
            "{}",
            title
        );

        let detail = if f.status.is_server_error() {
            GENERIC_DETAIL.to_string()
        } else {
            f.message.to_string()
        };
        let debug = self
            .debug
            .then(|| json!({ "message": f.message.as_ref() }));

        ProblemDetails::new(error_type, title, status, instance, trace_id)
            .with_code(f.code)
            .with_detail(detail)
            .with_debug(debug)
    }

    fn unexpected(
        &self,
        e: &anyhow::Error,
        code: Option<ErrorCode>,
        instance: &str,
        trace_id: &TraceId,
    ) -> ProblemDetails {
        let causes: Vec<String> = e.chain().skip(1).map(ToString::to_string).collect();
        error!(
            error_type = error_types::INTERNAL_UNEXPECTED,
            status = 500u16,
            trace_id = %trace_id,
            causes = ?causes,
            stack = ?e,
            "Unhandled exception: {e}"
        );

        let debug = self.debug.then(|| {
            let mut block = Map::new();
            block.insert("message".into(), json!(e.to_string()));
            block.insert("stack".into(), json!(format!("{e:?}")));
            if !causes.is_empty() {
                block.insert("cause".into(), json!(causes));
            }
            Value::Object(block)
        });

        ProblemDetails::new(
            error_types::INTERNAL_UNEXPECTED,
            "Internal Server Error",
            500,
            instance,
            trace_id,
        )
        .with_code(code)
        .with_detail(GENERIC_DETAIL)
        .with_debug(debug)
    }
}

fn source_chain(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut out = Vec::new();
    let mut next = err.source();
    while let Some(cause) = next {
        out.push(cause.to_string());
        next = cause.source();
    }
    out
}

/// Render every failed response below this layer as problem details.
pub async fn normalize_errors(
    State(normalizer): State<ErrorNormalizer>,
    req: Request,
    next: Next,
) -> Response {
    let trace_id = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.trace_id().clone())
        .unwrap_or_else(TraceId::generate);
    let instance = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let response = next.run(req).await;
    let status = response.status();
    let has_failure = response.extensions().get::<FailureSlot>().is_some();
    if !has_failure && !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    // Our own failures are normalized whatever status they declare.
    let (mut parts, body) = response.into_parts();
    let failure = match parts.extensions.remove::<FailureSlot>() {
        Some(FailureSlot(failure)) => failure,
        None => Arc::new(framework_rejection(status, body).await),
    };

    normalizer
        .normalize(&failure, &instance, &trace_id)
        .into_response()
}

/// A failed response produced outside our own error type (extractor
/// rejections, method-not-allowed). Client errors keep the rejection text.
async fn framework_rejection(status: StatusCode, body: Body) -> ApiError {
    let text = axum::body::to_bytes(body, REJECTION_BODY_LIMIT)
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default();

    let message = if status.is_client_error() && !text.is_empty() {
        text
    } else {
        status.canonical_reason().unwrap_or("Error").to_string()
    };
    ApiError::http(status, message)
}

/// `CatchPanicLayer` hook: a panicking handler becomes an unexpected failure.
pub fn panic_to_failure(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "non-string panic payload".to_string()
    };

    ApiError::Unexpected(anyhow::anyhow!("handler panicked: {message}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::problem::PROBLEM_JSON;

    fn trace() -> TraceId {
        TraceId::from("trace-1")
    }

    #[test]
    fn domain_errors_keep_their_fields_and_hide_meta() {
        let err = ApiError::from(
            DomainError::new("project.locked", "Project locked", 409)
                .with_detail("project is archived")
                .with_meta("project_id", "p-1"),
        );

        let problem = ErrorNormalizer::new(false).normalize(&err, "/api/projects/p-1", &trace());
        assert_eq!(problem.error_type, "project.locked");
        assert_eq!(problem.title, "Project locked");
        assert_eq!(problem.status, 409);
        assert_eq!(problem.detail.as_deref(), Some("project is archived"));
        assert!(problem.debug.is_none());

        let problem = ErrorNormalizer::new(true).normalize(&err, "/api/projects/p-1", &trace());
        let debug = problem.debug.unwrap();
        assert_eq!(debug["meta"]["project_id"], "p-1");
    }

    #[test]
    fn http_failures_get_route_derived_type_and_code() {
        let err = ApiError::http_with_code(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Missing required header: x-workspace-id",
            ErrorCode::WorkspaceHeaderRequired,
        );
        let problem = ErrorNormalizer::new(false).normalize(&err, "/api/tenant/ping", &trace());

        assert_eq!(problem.error_type, "tenant.error");
        assert_eq!(problem.title, "Unprocessable entity");
        assert_eq!(problem.code, Some(ErrorCode::WorkspaceHeaderRequired));
        assert_eq!(
            problem.detail.as_deref(),
            Some("Missing required header: x-workspace-id")
        );
        assert_eq!(problem.instance, "/api/tenant/ping");
        assert_eq!(problem.trace_id, "trace-1");
    }

    #[test]
    fn server_side_http_failures_hide_their_message() {
        let err = ApiError::http(StatusCode::INTERNAL_SERVER_ERROR, "Workspace context missing");
        let problem = ErrorNormalizer::new(false).normalize(&err, "/api/tenant/ping", &trace());
        assert_eq!(problem.detail.as_deref(), Some(GENERIC_DETAIL));
        assert_eq!(problem.error_type, "tenant.error");
    }

    #[test]
    fn unexpected_errors_never_leak_content() {
        let err = ApiError::from(anyhow::anyhow!("connection refused at 10.0.0.7:5432"));
        let problem = ErrorNormalizer::new(false).normalize(&err, "/api/me", &trace());

        assert_eq!(problem.error_type, error_types::INTERNAL_UNEXPECTED);
        assert_eq!(problem.title, "Internal Server Error");
        assert_eq!(problem.status, 500);
        let body = serde_json::to_string(&problem).unwrap();
        assert!(!body.contains("10.0.0.7"));
    }

    #[test]
    fn unexpected_errors_propagate_a_wrapped_code() {
        let inner = DomainError::new("tenant.forbidden", "Forbidden", 403)
            .with_code(ErrorCode::WorkspaceForbidden);
        let err = ApiError::Unexpected(anyhow::Error::new(inner).context("while loading"));

        let problem = ErrorNormalizer::new(false).normalize(&err, "/api/x", &trace());
        assert_eq!(problem.status, 500);
        assert_eq!(problem.code, Some(ErrorCode::WorkspaceForbidden));
    }

    #[test]
    fn directory_failures_are_unexpected() {
        let err = ApiError::from(DirectoryError::Unavailable("pool closed".into()));
        assert!(matches!(err, ApiError::Unexpected(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn into_response_carries_the_failure_without_a_body() {
        let response = ApiError::http(StatusCode::FORBIDDEN, "nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.extensions().get::<FailureSlot>().is_some());
    }

    #[test]
    fn panic_payloads_become_unexpected_failures() {
        let response = panic_to_failure(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let slot = response.extensions().get::<FailureSlot>().unwrap();
        assert!(matches!(*slot.0, ApiError::Unexpected(_)));
    }

    #[tokio::test]
    async fn framework_rejections_keep_client_text() {
        let err =
            framework_rejection(StatusCode::BAD_REQUEST, Body::from("Failed to parse JSON")).await;
        let ApiError::Http(f) = err else {
            panic!("expected http failure")
        };
        assert_eq!(f.message, "Failed to parse JSON");

        let err = framework_rejection(StatusCode::METHOD_NOT_ALLOWED, Body::empty()).await;
        let ApiError::Http(f) = err else {
            panic!("expected http failure")
        };
        assert_eq!(f.message, "Method Not Allowed");
    }

    #[test]
    fn out_of_range_domain_status_is_clamped_in_header_and_body() {
        let err = ApiError::from(DomainError::new("billing.odd", "Odd", 1000));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let problem = ErrorNormalizer::new(false).normalize(&err, "/api/billing", &trace());
        assert_eq!(problem.status, 500);
        assert_eq!(problem.error_type, "billing.odd");

        let err = ApiError::from(DomainError::new("billing.odd", "Odd", 700));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn through_normalizer(err: fn() -> ApiError) -> (StatusCode, Option<String>, Value) {
        use axum::{Router, middleware::from_fn_with_state, routing::get};
        use tower::ServiceExt;

        let app = Router::new()
            .route("/api/billing", get(move || async move { err() }))
            .layer(from_fn_with_state(ErrorNormalizer::new(false), normalize_errors));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/billing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn non_error_domain_status_still_gets_a_problem_body() {
        let (status, content_type, body) =
            through_normalizer(|| DomainError::new("billing.moved", "Moved", 302).into()).await;

        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(content_type.as_deref(), Some(PROBLEM_JSON));
        assert_eq!(body["type"], "billing.moved");
        assert_eq!(body["status"], 302);
        assert!(body["traceId"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn out_of_range_domain_status_agrees_on_the_wire() {
        let (status, _, body) =
            through_normalizer(|| DomainError::new("billing.odd", "Odd", 1000).into()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], 500);
        assert_eq!(body["type"], "billing.odd");
    }
}
