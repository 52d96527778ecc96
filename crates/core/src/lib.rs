//! `gatehouse-core`: identifiers and the application error model.
//!
//! This crate contains **pure** primitives shared by every other crate
//! (no HTTP, no storage).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult, ErrorCode, error_types};
pub use id::{InvalidId, TenantId, UserId};
