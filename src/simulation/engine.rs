//! High-level runtime engine settings
//!
//! Selects the integrator and boundary policy used when advecting particles

use crate::configuration::config::{BoundaryConfig, IntegratorConfig};

#[derive(Debug, Clone, Copy)]
pub struct Engine {
    pub integrator: IntegratorConfig, // euler or midpoint
    pub boundary: BoundaryConfig, // reflect or respawn
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            integrator: IntegratorConfig::Midpoint,
            boundary: BoundaryConfig::Respawn,
        }
    }
}
