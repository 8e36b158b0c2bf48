pub mod states;
pub mod params;
pub mod engine;
pub mod fields;
pub mod integrator;
pub mod animation;
pub mod scenario;
