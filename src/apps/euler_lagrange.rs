//! Eulerian vs Lagrangian description of the same flow
//!
//! Fixed probes report the velocity at their location (Euler); tracers carry
//! their own history through the flow (Lagrange). A speed or divergence
//! heatmap sits underneath both.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::simulation::animation::FrameApp;
use crate::simulation::engine::Engine;
use crate::simulation::fields::{FieldSet, VelocityField};
use crate::simulation::integrator::advect;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Domain, NVec2, Particle};
use crate::visualization::canvas::{Canvas, ACCENT, BACKGROUND, GRID, WHITE};
use crate::visualization::heatmap::{Metric, ScalarGrid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    Euler,
    Lagrange,
    #[default]
    Both,
}

/// Tracer-follow interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowMode {
    #[default]
    None,
    Awaiting, // next click picks a tracer
    Following(usize),
}

pub struct EulerLagrangeApp {
    field: FieldSet,
    domain: Domain,
    engine: Engine,
    params: Parameters,
    rng: StdRng,
    pub t: f64,
    pub tracers: Vec<Particle>,
    pub probes: Vec<NVec2>,
    pub metric: Option<Metric>,
    grid: [usize; 2],
    heatmap: Option<ScalarGrid>,
    pub view: ViewMode,
    pub follow: FollowMode,
}

impl EulerLagrangeApp {
    pub fn new(
        field: FieldSet,
        domain: Domain,
        engine: Engine,
        params: Parameters,
        metric: Option<Metric>,
        grid: [usize; 2],
        probes: [usize; 2],
    ) -> Self {
        let mut app = Self {
            field,
            domain,
            engine,
            rng: StdRng::seed_from_u64(params.seed),
            params,
            t: 0.0,
            tracers: Vec::new(),
            probes: domain.lattice(probes[0], probes[1]),
            metric,
            grid,
            heatmap: None,
            view: ViewMode::Both,
            follow: FollowMode::None,
        };
        app.reset();
        app
    }

    pub fn heatmap(&self) -> Option<&ScalarGrid> {
        self.heatmap.as_ref()
    }

    pub fn set_metric(&mut self, metric: Option<Metric>) {
        self.metric = metric;
        self.refresh_heatmap();
    }

    fn refresh_heatmap(&mut self) {
        self.heatmap = self
            .metric
            .map(|m| ScalarGrid::sample(&self.field, m, &self.domain, self.grid[0], self.grid[1], self.t));
    }

    /// Eulerian readout: (probe position, velocity there now)
    pub fn probe_velocities(&self) -> Vec<(NVec2, NVec2)> {
        self.probes.iter().map(|p| (*p, self.field.velocity(p, self.t))).collect()
    }

    /// Lagrangian readout: velocity of the followed tracer
    pub fn followed_velocity(&self) -> Option<NVec2> {
        match self.follow {
            FollowMode::Following(i) => self.tracers.get(i).map(|p| self.field.velocity(&p.x, self.t)),
            _ => None,
        }
    }

    pub fn request_follow(&mut self) {
        self.follow = FollowMode::Awaiting;
    }

    pub fn stop_following(&mut self) {
        self.follow = FollowMode::None;
    }
}

impl FrameApp for EulerLagrangeApp {
    fn name(&self) -> &'static str {
        "euler_lagrange"
    }

    fn update(&mut self, dt: f64) {
        let params = Parameters { dt, ..self.params.clone() };
        advect(&mut self.tracers, &self.field, &self.domain, &self.engine, &params, self.t, &mut self.rng);
        self.t += dt;
        self.refresh_heatmap();
    }

    fn render(&self, canvas: &mut Canvas) {
        match (&self.heatmap, self.metric) {
            (Some(grid), Some(metric)) => grid.rasterize(canvas, metric.ramp(), grid.range(metric.signed())),
            _ => {
                canvas.clear(BACKGROUND);
                canvas.draw_grid(1.0, GRID);
            }
        }

        if matches!(self.view, ViewMode::Euler | ViewMode::Both) {
            // arrows scaled so the fastest probe spans most of a cell
            let probes = self.probe_velocities();
            let max_speed = probes.iter().map(|(_, v)| v.norm()).filter(|s| s.is_finite()).fold(0.0, f64::max);
            let cell = self.domain.width() / (self.probes.len() as f64).sqrt().max(1.0);
            let scale = if max_speed > 0.0 { 0.8 * cell / max_speed } else { 0.0 };
            for (p, v) in probes {
                canvas.fill_disc(&p, 2.0, WHITE);
                canvas.draw_arrow(&p, &(scale * v), WHITE);
            }
        }

        if matches!(self.view, ViewMode::Lagrange | ViewMode::Both) {
            for (i, tracer) in self.tracers.iter().enumerate() {
                if self.follow == FollowMode::Following(i) {
                    canvas.draw_polyline(tracer.trail.points(), ACCENT);
                    canvas.fill_disc(&tracer.x, 5.0, ACCENT);
                } else {
                    canvas.fill_disc(&tracer.x, 2.0, [230, 230, 230, 255]);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.t = 0.0;
        self.rng = StdRng::seed_from_u64(self.params.seed);
        self.tracers = (0..self.params.particle_count)
            .map(|_| Particle::new(self.domain.random_point(&mut self.rng), self.params.lifetime, self.params.trail_length))
            .collect();
        self.follow = FollowMode::None;
        self.refresh_heatmap();
        info!(tracers = self.tracers.len(), probes = self.probes.len(), "euler-lagrange reset");
    }

    fn status(&self) -> String {
        let follow = match self.followed_velocity() {
            Some(v) => format!("  followed |v| = {:.3}", v.norm()),
            None => String::new(),
        };
        format!("t = {:.2}  view = {:?}  metric = {:?}{}  {}", self.t, self.view, self.metric, follow, self.field.formula())
    }

    fn pointer_down(&mut self, p: NVec2) {
        if self.follow != FollowMode::Awaiting {
            return;
        }
        let nearest = self
            .tracers
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (a.x - p).norm_squared().total_cmp(&(b.x - p).norm_squared()))
            .map(|(i, _)| i);
        self.follow = match nearest {
            Some(i) => FollowMode::Following(i),
            None => FollowMode::None,
        };
    }

    fn resize(&mut self, _width: usize, _height: usize) {
        self.reset();
    }
}
