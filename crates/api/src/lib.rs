//! HTTP API: request pipeline, routing, and problem-details error mapping.
//!
//! Every request runs the same ordered pipeline:
//!
//! 1. [`correlation`]: resolve the trace id and open the request span.
//! 2. [`app::errors::normalize_errors`]: render any failure below it as
//!    problem details.
//! 3. [`guard`]: authenticate (unless the route is public).
//! 4. [`tenancy`]: resolve the workspace (tenant-scoped routes only).
//! 5. The handler.

pub mod app;
pub mod config;
pub mod context;
pub mod correlation;
pub mod guard;
pub mod middleware;
pub mod tenancy;
