//! Build fully-initialized app scenarios from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces runtime bundles
//! (`Scenario` for the 2D canvas apps, `DeformationScene` for the 3D
//! lattice view) containing:
//! - engine settings (`Engine`)
//! - numerical parameters (`Parameters`)
//! - the world rectangle the canvas maps onto
//! - the app itself, behind the [`FrameApp`] trait
//!
//! With the `viewer` feature these are inserted into Bevy as `Resource`s.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::{info, warn};

use crate::apps::deformation::Deformation;
use crate::apps::{
    deformation::DeformationApp, density::DensityApp, euler_lagrange::EulerLagrangeApp, kinematics::KinematicsApp,
    mean_free_path::MeanFreePathApp, meniscus::MeniscusApp,
};
use crate::configuration::config::{AppKind, CanvasConfig, DeformationConfig, FieldConfig, FlowPreset, ScenarioConfig};
use crate::error::{Result, SimError};
use crate::expression::Bindings;
use crate::simulation::animation::FrameApp;
use crate::simulation::engine::Engine;
use crate::simulation::fields::{ExpressionField, FieldSet, FlowParams, PresetField};
use crate::simulation::params::Parameters;
use crate::simulation::states::{Domain, NVec2, NVec3};
use crate::visualization::heatmap::Metric;

/// Read a `ScenarioConfig` from a YAML file
pub fn load_scenario(path: impl AsRef<Path>) -> Result<ScenarioConfig> {
    let file = File::open(path.as_ref())?;
    let cfg: ScenarioConfig = serde_yaml::from_reader(BufReader::new(file))?;
    Ok(cfg)
}

/// Sum the configured field terms. An empty list means solid-body rotation.
pub fn build_field_set(terms: &[FieldConfig]) -> Result<FieldSet> {
    if terms.is_empty() {
        return Ok(FieldSet::new().with(PresetField::new(FlowPreset::Rotation, FlowParams::default())));
    }

    let mut set = FieldSet::new();
    for (i, fc) in terms.iter().enumerate() {
        match (&fc.preset, &fc.u, &fc.v) {
            (Some(preset), _, _) => {
                let params = FlowParams {
                    strength: fc.strength,
                    rate: fc.rate,
                    omega: fc.omega,
                };
                set.push(Box::new(PresetField::new(*preset, params)));
            }
            (None, u, v) if u.is_some() || v.is_some() => {
                let u = u.as_deref().unwrap_or("0");
                let v = v.as_deref().unwrap_or("0");
                let (field, err) = ExpressionField::lenient(u, v, &fc.constants);
                if let Some(err) = err {
                    warn!(term = i, "field term falls back to zero: {err}");
                }
                set.push(Box::new(field));
            }
            _ => {
                return Err(SimError::config(format!("field term {i} needs a preset or u/v expressions")));
            }
        }
    }
    Ok(set)
}

/// Runtime bundle for one 2D app
///
/// The app owns all of its simulation state; the scenario adds what the
/// frame loop and the viewer need around it.
#[cfg_attr(feature = "viewer", derive(bevy::prelude::Resource))]
pub struct Scenario {
    pub engine: Engine,
    pub parameters: Parameters,
    pub world: Domain, // region shown on the canvas
    pub canvas: CanvasConfig,
    pub frames: u64, // frames for headless runs
    pub app: Box<dyn FrameApp + Send + Sync>,
}

impl Scenario {
    pub fn build_scenario(cfg: ScenarioConfig) -> Result<Self> {
        // Engine (runtime) from EngineConfig
        let e_cfg = &cfg.engine;
        if !(e_cfg.dt.is_finite() && e_cfg.dt > 0.0) {
            return Err(SimError::config(format!("engine.dt must be positive, got {}", e_cfg.dt)));
        }
        let engine = Engine {
            integrator: e_cfg.integrator,
            boundary: e_cfg.boundary,
        };

        // Parameters (runtime) from ParticlesConfig
        let p_cfg = &cfg.particles;
        let parameters = Parameters {
            dt: e_cfg.dt,
            particle_count: p_cfg.count,
            lifetime: p_cfg.lifetime,
            trail_length: p_cfg.trail_length,
            seed: p_cfg.seed,
        };

        let d = &cfg.domain;
        if !(d.x_max > d.x_min && d.y_max > d.y_min) {
            return Err(SimError::config("domain must have x_max > x_min and y_max > y_min"));
        }
        let domain = Domain::new(NVec2::new(d.x_min, d.y_min), NVec2::new(d.x_max, d.y_max));

        let (world, app): (Domain, Box<dyn FrameApp + Send + Sync>) = match cfg.app {
            AppKind::Kinematics => {
                let field = build_field_set(&cfg.fields)?;
                let app = KinematicsApp::new(field, domain, engine, parameters.clone(), cfg.kinematics.clone());
                (domain, Box::new(app))
            }
            AppKind::EulerLagrange => {
                let field = build_field_set(&cfg.fields)?;
                let el = &cfg.euler_lagrange;
                let app = EulerLagrangeApp::new(
                    field,
                    domain,
                    engine,
                    parameters.clone(),
                    Metric::from_config(el.metric),
                    el.grid,
                    el.probes,
                );
                (domain, Box::new(app))
            }
            AppKind::Density => {
                let app = DensityApp::new(domain, parameters.clone(), cfg.density.clone());
                (domain, Box::new(app))
            }
            AppKind::MeanFreePath => {
                let app = MeanFreePathApp::new(domain, cfg.collisions.clone(), parameters.seed);
                (domain, Box::new(app))
            }
            AppKind::Deformation => {
                let df = &cfg.deformation;
                let app = DeformationApp::new(&df.u, &df.v, &df.w, bindings(df), df.lattice, df.extent, df.scale);
                (app.view_domain(), Box::new(app))
            }
            AppKind::Meniscus => {
                let app = MeniscusApp::new(&cfg.meniscus);
                (app.view_domain(), Box::new(app))
            }
        };

        info!(app = app.name(), status = %app.status(), "scenario built");

        Ok(Self {
            engine,
            parameters,
            world,
            canvas: cfg.canvas.clone(),
            frames: e_cfg.frames,
            app,
        })
    }
}

fn bindings(df: &DeformationConfig) -> Bindings {
    df.constants.iter().fold(Bindings::new(), |b, (k, v)| b.with(k.clone(), *v))
}

// =========================================================================================
// 3d stuff below
// =========================================================================================

/// Runtime bundle for the 3D lattice view of a displacement field
#[cfg_attr(feature = "viewer", derive(bevy::prelude::Resource))]
pub struct DeformationScene {
    pub deformation: Deformation,
    pub bindings: Bindings,
    pub lattice: usize,
    pub extent: f64,
    pub scale: f64,
}

impl DeformationScene {
    pub fn build_scene(cfg: &DeformationConfig) -> Self {
        let (deformation, err) = Deformation::compute(&cfg.u, &cfg.v, &cfg.w);
        if let Some(err) = err {
            warn!("deformation scene: {err}");
        }
        Self {
            deformation,
            bindings: bindings(cfg),
            lattice: cfg.lattice,
            extent: cfg.extent,
            scale: cfg.scale,
        }
    }

    /// Multiply the displacement scale; non-positive or non-finite factors are ignored
    pub fn rescale(&mut self, factor: f64) {
        if factor.is_finite() && factor > 0.0 {
            self.scale *= factor;
        }
    }

    /// Original and displaced lattice points
    pub fn points(&self) -> Vec<(NVec3, NVec3)> {
        self.deformation.deformed_lattice(self.lattice, self.extent, self.scale, &self.bindings)
    }
}
