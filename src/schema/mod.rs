//! Schema module - Configuration, sweep, and snapshot types for search runs.

mod config;
mod snapshot;
mod sweep;

pub use config::*;
pub use snapshot::*;
pub use sweep::*;
