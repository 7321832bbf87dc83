//! Drift Core
//!
//! Contains the local particle simulation:
//! - Particle pool with dead-slot reuse
//! - Coherent noise field
//! - Gravity + noise integrator with boundary routing
//! - Deterministic time and math
//! - Render driver contract

pub mod math;
pub mod noise;
pub mod physics;
pub mod pool;
pub mod render;
pub mod time;

pub use glam;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
