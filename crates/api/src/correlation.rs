//! Trace id resolution. Runs first so every later failure can be correlated.

use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, info, info_span};

use crate::context::{RequestContext, TraceId};

pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Reuse a non-blank inbound trace id, otherwise generate one.
pub fn resolve_trace_id(headers: &HeaderMap) -> TraceId {
    headers
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(TraceId::from)
        .unwrap_or_else(TraceId::generate)
}

pub async fn trace_id_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = resolve_trace_id(req.headers());
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    req.extensions_mut()
        .insert(RequestContext::new(trace_id.clone()));

    let span = info_span!(
        "request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
    );
    let started = Instant::now();

    let mut response = next.run(req).instrument(span.clone()).await;

    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }

    span.in_scope(|| {
        info!(
            status = response.status().as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "request_completed"
        );
    });

    response
}
