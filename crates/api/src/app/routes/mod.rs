//! Route groups. Each module exposes a `router()` with absolute paths.

pub mod me;
pub mod system;
pub mod tenant;
