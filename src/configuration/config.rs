//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! scenario. A scenario consists of:
//!
//! - [`AppKind`]           – which teaching app to run
//! - [`EngineConfig`]      – integrator, boundary policy, frame step and count
//! - [`DomainConfig`]      – simulated region in world units
//! - [`CanvasConfig`]      – raster size
//! - [`FieldConfig`]       – velocity field terms (presets or typed expressions), summed
//! - [`ParticlesConfig`]   – tracer count, lifetime, trail length, seed
//! - one section per app   – app specific knobs
//! - [`ScenarioConfig`]    – top-level wrapper used to load a scenario from YAML
//!
//! Everything except `app` has a default.
//!
//! # YAML format
//! An example kinematics scenario matching these types:
//!
//! ```yaml
//! app: kinematics
//!
//! engine:
//!   integrator: "midpoint"  # or "euler"
//!   boundary: "respawn"     # or "reflect"
//!   dt: 0.016
//!   frames: 600
//!
//! domain: { x_min: -5.0, x_max: 5.0, y_min: -5.0, y_max: 5.0 }
//!
//! fields:
//!   - preset: "rotation"
//!     strength: 1.0
//!   - u: "0.2*sin(t)"       # typed field, summed with the preset
//!     v: "0"
//!
//! particles:
//!   count: 300
//!   lifetime: 8.0
//!   trail_length: 40
//!   seed: 42
//! ```
//!
//! The scenario builder then maps this configuration into its runtime app.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Which integrator is used to advance particles
/// `integrator: "euler"` or `integrator: "midpoint"`
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegratorConfig {
    #[serde(rename = "euler")] // Forward Euler, one field evaluation per step
    Euler,

    #[serde(rename = "midpoint")] // Second-order midpoint: half step, re-evaluate, full step
    Midpoint,
}

/// What happens to a particle that leaves the domain
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryConfig {
    #[serde(rename = "reflect")] // clamp position, invert the offending velocity component
    Reflect,

    #[serde(rename = "respawn")] // restart at a random point in the domain
    Respawn,
}

/// The six teaching apps
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppKind {
    Kinematics,
    Deformation,
    Density,
    MeanFreePath,
    EulerLagrange,
    Meniscus,
}

/// Enumerated flow presets
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlowPreset {
    Uniform,
    Rotation,
    Shear,
    Stagnation,
    Vortex,
    RadialExpansion,
    Spiral,
    CompressionWave,
    Oscillating,
}

/// Scalar metric painted under the Euler-Lagrange view
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricConfig {
    None,
    Speed,
    Divergence,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub integrator: IntegratorConfig, // Time integrator used for advancing particles
    pub boundary: BoundaryConfig, // Policy for particles leaving the domain
    pub dt: f64, // Simulated time per frame
    pub frames: u64, // Frames to run in headless mode
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            integrator: IntegratorConfig::Midpoint,
            boundary: BoundaryConfig::Respawn,
            dt: 1.0 / 60.0,
            frames: 600,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DomainConfig {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self { x_min: -5.0, x_max: 5.0, y_min: -5.0, y_max: 5.0 }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: usize,
    pub height: usize,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self { width: 800, height: 600 }
    }
}

/// One velocity field term. Either `preset` or both `u` and `v` must be set.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FieldConfig {
    pub preset: Option<FlowPreset>,
    pub strength: f64, // main amplitude / rate `a`
    pub rate: f64, // secondary rate `b` or wave number `k`
    pub omega: f64, // angular frequency for time-dependent presets
    pub u: Option<String>, // typed x-velocity in x, y, t
    pub v: Option<String>, // typed y-velocity in x, y, t
    pub constants: BTreeMap<String, f64>, // extra symbols usable in `u` / `v`
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            preset: None,
            strength: 1.0,
            rate: 0.5,
            omega: 1.0,
            u: None,
            v: None,
            constants: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ParticlesConfig {
    pub count: usize,
    pub lifetime: f64,
    pub trail_length: usize,
    pub seed: u64,
}

impl Default for ParticlesConfig {
    fn default() -> Self {
        Self { count: 200, lifetime: 8.0, trail_length: 40, seed: 42 }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct KinematicsConfig {
    pub show_streamlines: bool,
    pub show_pathlines: bool,
    pub show_streaklines: bool,
    pub streamline_seeds: usize, // seeds per axis
    pub streamline_step: f64, // arc-length-ish step for frozen-time tracing
    pub streamline_max_steps: usize,
    pub injectors: Vec<[f64; 2]>,
    pub emit_interval: f64, // seconds between streak emissions
    pub max_streak_particles: usize,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            show_streamlines: true,
            show_pathlines: true,
            show_streaklines: true,
            streamline_seeds: 6,
            streamline_step: 0.05,
            streamline_max_steps: 400,
            injectors: Vec::new(),
            emit_interval: 0.1,
            max_streak_particles: 600,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DensityConfig {
    pub speed: f64, // max initial particle speed
    pub particle_radius: f64, // drawn radius, world units
    pub weight_radius: f64, // neighborhood radius for the visual weight
    pub control_volume: Option<[f64; 4]>, // x0, y0, x1, y1
    pub history: usize, // number of kept density samples
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            particle_radius: 0.04,
            weight_radius: 0.5,
            control_volume: None,
            history: 240,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CollisionsConfig {
    pub obstacles: usize,
    pub obstacle_radius: f64,
    pub obstacle_mass: f64,
    pub obstacle_speed: f64,
    pub player_radius: f64,
    pub player_mass: f64,
    pub player_accel: f64, // steering acceleration
    pub max_speed: f64,
    pub time_limit: f64,
}

impl Default for CollisionsConfig {
    fn default() -> Self {
        Self {
            obstacles: 40,
            obstacle_radius: 0.25,
            obstacle_mass: 1.0,
            obstacle_speed: 1.5,
            player_radius: 0.2,
            player_mass: 1.0,
            player_accel: 6.0,
            max_speed: 4.0,
            time_limit: 60.0,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EulerLagrangeConfig {
    pub metric: MetricConfig,
    pub grid: [usize; 2], // coarse heatmap sample grid
    pub probes: [usize; 2], // Eulerian probe lattice
}

impl Default for EulerLagrangeConfig {
    fn default() -> Self {
        Self {
            metric: MetricConfig::Speed,
            grid: [32, 24],
            probes: [8, 6],
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DeformationConfig {
    pub u: String,
    pub v: String,
    pub w: String,
    pub constants: BTreeMap<String, f64>,
    pub lattice: usize, // points per axis
    pub extent: f64, // half width of the lattice cube
    pub scale: f64, // displacement magnification
}

impl Default for DeformationConfig {
    fn default() -> Self {
        Self {
            u: "0.1*x".to_string(),
            v: "0".to_string(),
            w: "0".to_string(),
            constants: BTreeMap::new(),
            lattice: 5,
            extent: 1.0,
            scale: 1.0,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MeniscusConfig {
    pub surface_tension: f64, // N/m
    pub density: f64, // kg/m^3
    pub gravity: f64, // m/s^2
    pub contact_angle_deg: f64,
    pub step_interval: f64, // seconds between revealed derivation steps
}

impl Default for MeniscusConfig {
    fn default() -> Self {
        // water against clean glass
        Self {
            surface_tension: 0.072,
            density: 1000.0,
            gravity: 9.81,
            contact_angle_deg: 20.0,
            step_interval: 3.0,
        }
    }
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    pub app: AppKind, // Which app to build
    #[serde(default)]
    pub engine: EngineConfig, // Integrator, boundary, step
    #[serde(default)]
    pub domain: DomainConfig, // World-space region
    #[serde(default)]
    pub canvas: CanvasConfig, // Raster size
    #[serde(default)]
    pub fields: Vec<FieldConfig>, // Summed velocity field terms
    #[serde(default)]
    pub particles: ParticlesConfig,
    #[serde(default)]
    pub kinematics: KinematicsConfig,
    #[serde(default)]
    pub density: DensityConfig,
    #[serde(default)]
    pub collisions: CollisionsConfig,
    #[serde(default)]
    pub euler_lagrange: EulerLagrangeConfig,
    #[serde(default)]
    pub deformation: DeformationConfig,
    #[serde(default)]
    pub meniscus: MeniscusConfig,
}
