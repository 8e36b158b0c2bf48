pub mod error;
pub mod expression;
pub mod simulation;
pub mod configuration;
pub mod visualization;
pub mod apps;
pub mod benchmark;

pub use error::{ExpressionError, Result, SimError};
pub use expression::{differentiate, parse, simplify, Bindings, Expr};

pub use simulation::states::{Body, System, Particle, Domain, ControlVolume, NVec2, NVec3};
pub use simulation::fields::{VelocityField, PresetField, ExpressionField, FieldSet, FlowParams};
pub use simulation::integrator::{advect, displacement};
pub use simulation::animation::{AnimationLoop, FrameApp, PlayState};
pub use simulation::scenario::{load_scenario, Scenario, DeformationScene};

pub use configuration::config::{AppKind, IntegratorConfig, BoundaryConfig, EngineConfig, FieldConfig, FlowPreset, ScenarioConfig};

pub use visualization::canvas::Canvas;
#[cfg(feature = "viewer")]
pub use visualization::{cmviz_vis2d::run_2d, cmviz_vis3d::run_3d};

pub use benchmark::benchmark::{bench_advection, bench_advection_curve, bench_symbolic};
