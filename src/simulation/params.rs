//! Numerical parameters for the simulations
//!
//! `Parameters` holds runtime settings:
//! - frame time step,
//! - particle count, lifetime and trail length,
//! - random seed

#[derive(Debug, Clone)]
pub struct Parameters {
    pub dt: f64, // time step per frame
    pub particle_count: usize, // number of advected particles
    pub lifetime: f64, // particle lifetime before respawn
    pub trail_length: usize, // stored positions per particle trail
    pub seed: u64, // deterministic seed
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            particle_count: 200,
            lifetime: 8.0,
            trail_length: 40,
            seed: 42,
        }
    }
}
