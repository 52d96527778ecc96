//! Problem-details response body.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use gatehouse_core::ErrorCode;

use crate::context::TraceId;
use crate::correlation::TRACE_ID_HEADER;

pub const PROBLEM_JSON: &str = "application/problem+json";

/// The single failure shape every error response uses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub instance: String,
    pub trace_id: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
}

impl ProblemDetails {
    pub fn new(
        error_type: impl Into<String>,
        title: impl Into<String>,
        status: u16,
        instance: impl Into<String>,
        trace_id: &TraceId,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            code: None,
            title: title.into(),
            status,
            detail: None,
            instance: instance.into(),
            trace_id: trace_id.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            debug: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_code(mut self, code: Option<ErrorCode>) -> Self {
        self.code = code;
        self
    }

    pub fn with_debug(mut self, debug: Option<Value>) -> Self {
        self.debug = debug;
        self
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let trace = HeaderValue::from_str(&self.trace_id).ok();

        let mut response = (
            status,
            [(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON))],
            Json(self),
        )
            .into_response();

        if let Some(value) = trace {
            response.headers_mut().insert(TRACE_ID_HEADER, value);
        }
        response
    }
}

/// Route-scoped error type: `<namespace>.<suffix>`.
///
/// The namespace is the path segment after `api` (or the first segment when
/// there is no `api` segment), lower-cased, with one trailing `s` removed.
/// Paths with no usable segment fall back to `internal`.
pub fn derive_error_type(path: &str, status: u16) -> String {
    let path = path.split('?').next().unwrap_or("");
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let namespace = match segments.iter().position(|s| *s == "api") {
        Some(idx) => segments.get(idx + 1).copied(),
        None => segments.first().copied(),
    };

    let mut namespace = namespace
        .map(str::to_lowercase)
        .unwrap_or_else(|| "internal".to_string());
    if namespace.ends_with('s') && namespace.chars().count() > 1 {
        namespace.pop();
    }

    format!("{namespace}.{}", status_suffix(status))
}

fn status_suffix(status: u16) -> &'static str {
    match status {
        400 => "badRequest",
        401 => "unauthorized",
        403 => "forbidden",
        404 => "notFound",
        _ => "error",
    }
}

/// Sentence-case status name, e.g. `Unprocessable entity`.
pub fn status_title(status: u16) -> String {
    let Some(reason) = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
    else {
        return "Error".to_string();
    };

    let lower = reason.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Error".to_string(),
    }
}
