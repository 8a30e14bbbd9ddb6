//! Shared types and collaborators for the cubeworld engine.
//!
//! # Invariants
//! - No process-wide state: configuration and caches are values owned by
//!   whoever constructs them and passed down explicitly.

pub mod cache;
pub mod config;
pub mod types;

pub use cache::{CacheError, ResourceCache};
pub use config::{Config, ConfigError};
pub use types::{Extent2D, Transform};

pub fn crate_info() -> &'static str {
    "cubeworld-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}
