//! Directory backends.
//!
//! Both implement [`gatehouse_auth::PrincipalDirectory`] and
//! [`gatehouse_auth::MembershipStore`]:
//!
//! - [`InMemoryDirectory`]: tests and local development.
//! - [`PgDirectory`]: Postgres via sqlx.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryDirectory;
pub use postgres::PgDirectory;
