//! Infrastructure layer: implementations of the directory contracts.

pub mod directory;

pub use directory::{InMemoryDirectory, PgDirectory};
