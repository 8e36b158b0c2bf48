//! Streamlines, pathlines and streaklines of a 2D velocity field
//!
//! - streamlines: frozen-time integral curves from a lattice of seeds
//! - pathlines:   trails of tracers advected through time
//! - streaklines: every particle released from an injector so far

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::configuration::config::KinematicsConfig;
use crate::simulation::animation::FrameApp;
use crate::simulation::engine::Engine;
use crate::simulation::fields::{FieldSet, VelocityField};
use crate::simulation::integrator::{advect, displacement};
use crate::simulation::params::Parameters;
use crate::simulation::states::{Domain, Injector, NVec2, Particle};
use crate::visualization::canvas::{Canvas, ACCENT, BACKGROUND, BLUE, GREEN, GRID, RED, WHITE};

/// Below this speed a streamline is considered stalled
const STAGNATION_SPEED: f64 = 1e-9;

/// What the next click does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    None, // click drops a tracer
    AwaitingInjector, // click places an injector
    Following(usize), // a tracer is highlighted
}

/// A particle released by injector `injector`
#[derive(Debug, Clone)]
pub struct StreakParticle {
    pub injector: usize,
    pub x: NVec2,
}

/// Frozen-time integral curve through `seed` at time `t`.
///
/// Steps a fixed distance `ds` along the unit direction field using a midpoint
/// rule; negative `ds` traces upstream. Stops on leaving `domain`, at stagnation,
/// on non-finite values, or when the curve closes back onto its seed.
pub fn trace_streamline<F>(field: &F, seed: NVec2, t: f64, ds: f64, max_steps: usize, domain: &Domain) -> Vec<NVec2>
where
    F: VelocityField + ?Sized,
{
    let direction = |p: &NVec2| -> Option<NVec2> {
        let v = field.velocity(p, t);
        let speed = v.norm();
        if !speed.is_finite() || speed < STAGNATION_SPEED {
            return None;
        }
        Some(v / speed)
    };

    let mut line = vec![seed];
    let mut p = seed;
    for step in 0..max_steps {
        let Some(d1) = direction(&p) else { break };
        let mid = p + 0.5 * ds * d1;
        let Some(d2) = direction(&mid) else { break };
        let next = p + ds * d2;
        if !domain.contains(&next) || !next.iter().all(|c| c.is_finite()) {
            break;
        }
        line.push(next);
        p = next;
        if step > 8 && (p - seed).norm() < 0.5 * ds.abs() {
            line.push(seed);
            break;
        }
    }
    line
}

/// Streamline through `seed` in both directions, upstream end first
pub fn trace_streamline_both<F>(field: &F, seed: NVec2, t: f64, ds: f64, max_steps: usize, domain: &Domain) -> Vec<NVec2>
where
    F: VelocityField + ?Sized,
{
    let forward = trace_streamline(field, seed, t, ds, max_steps, domain);
    // a closed loop is already complete
    if forward.len() > 2 && forward.last() == Some(&seed) {
        return forward;
    }
    let mut line = trace_streamline(field, seed, t, -ds, max_steps, domain);
    line.reverse();
    line.extend(forward.into_iter().skip(1));
    line
}

pub struct KinematicsApp {
    field: FieldSet,
    domain: Domain,
    engine: Engine,
    params: Parameters,
    cfg: KinematicsConfig,
    rng: StdRng,
    pub t: f64,
    pub tracers: Vec<Particle>,
    pub injectors: Vec<Injector>,
    streaks: VecDeque<StreakParticle>,
    emit_clock: f64,
    pub mode: InteractionMode,
}

impl KinematicsApp {
    pub fn new(field: FieldSet, domain: Domain, engine: Engine, params: Parameters, cfg: KinematicsConfig) -> Self {
        let mut app = Self {
            field,
            domain,
            engine,
            rng: StdRng::seed_from_u64(params.seed),
            params,
            cfg,
            t: 0.0,
            tracers: Vec::new(),
            injectors: Vec::new(),
            streaks: VecDeque::new(),
            emit_clock: 0.0,
            mode: InteractionMode::None,
        };
        app.reset();
        app
    }

    pub fn field(&self) -> &FieldSet {
        &self.field
    }

    /// Replace the velocity field; time and particles are kept
    pub fn set_field(&mut self, field: FieldSet) {
        info!(formula = %field.formula(), "kinematics field changed");
        self.field = field;
    }

    pub fn streak_particles(&self) -> impl Iterator<Item = &StreakParticle> {
        self.streaks.iter()
    }

    pub fn add_tracer(&mut self, p: NVec2) {
        let cap = self.params.particle_count.max(1) * 2;
        if self.tracers.len() >= cap {
            self.tracers.remove(0);
            self.mode = InteractionMode::None;
        }
        self.tracers.push(Particle::new(self.domain.clamp(p), self.params.lifetime, self.params.trail_length));
    }

    pub fn add_injector(&mut self, p: NVec2) {
        self.injectors.push(Injector { x: self.domain.clamp(p) });
    }

    /// The next click places an injector
    pub fn request_injector(&mut self) {
        self.mode = InteractionMode::AwaitingInjector;
    }

    /// Highlight the tracer nearest to `p`
    pub fn follow_nearest(&mut self, p: NVec2) -> Option<usize> {
        let nearest = self
            .tracers
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (a.x - p).norm_squared().total_cmp(&(b.x - p).norm_squared()))
            .map(|(i, _)| i)?;
        self.mode = InteractionMode::Following(nearest);
        Some(nearest)
    }

    /// Streamlines of the field frozen at the current time
    pub fn streamlines(&self) -> Vec<Vec<NVec2>> {
        let n = self.cfg.streamline_seeds;
        self.domain
            .lattice(n, n)
            .into_iter()
            .map(|seed| {
                trace_streamline_both(
                    &self.field,
                    seed,
                    self.t,
                    self.cfg.streamline_step,
                    self.cfg.streamline_max_steps,
                    &self.domain,
                )
            })
            .collect()
    }

    /// Per injector: the injection point followed by its particles, newest first
    pub fn streaklines(&self) -> Vec<Vec<NVec2>> {
        self.injectors
            .iter()
            .enumerate()
            .map(|(k, inj)| {
                std::iter::once(inj.x)
                    .chain(self.streaks.iter().rev().filter(|s| s.injector == k).map(|s| s.x))
                    .collect()
            })
            .collect()
    }

    fn emit(&mut self) {
        for k in 0..self.injectors.len() {
            self.streaks.push_back(StreakParticle { injector: k, x: self.injectors[k].x });
        }
        while self.streaks.len() > self.cfg.max_streak_particles {
            self.streaks.pop_front();
        }
    }

    fn advance_streaks(&mut self, dt: f64) {
        let (field, domain, t, method) = (&self.field, &self.domain, self.t, self.engine.integrator);
        for s in self.streaks.iter_mut() {
            s.x += displacement(field, &s.x, t, dt, method);
        }
        self.streaks.retain(|s| domain.contains(&s.x));
    }
}

impl FrameApp for KinematicsApp {
    fn name(&self) -> &'static str {
        "kinematics"
    }

    fn update(&mut self, dt: f64) {
        let params = Parameters { dt, ..self.params.clone() };
        advect(&mut self.tracers, &self.field, &self.domain, &self.engine, &params, self.t, &mut self.rng);

        self.advance_streaks(dt);
        self.emit_clock += dt;
        let interval = self.cfg.emit_interval;
        if self.emit_clock >= interval {
            // keep the remainder, at most one emission per frame
            self.emit_clock = (self.emit_clock - interval).min(interval);
            self.emit();
        }

        self.t += dt;
    }

    fn render(&self, canvas: &mut Canvas) {
        canvas.clear(BACKGROUND);
        canvas.draw_grid(1.0, GRID);

        if self.cfg.show_streamlines {
            for line in self.streamlines() {
                canvas.draw_polyline(line.iter(), BLUE);
            }
        }

        if self.cfg.show_pathlines {
            for (i, tracer) in self.tracers.iter().enumerate() {
                let followed = self.mode == InteractionMode::Following(i);
                canvas.draw_polyline(tracer.trail.points(), if followed { ACCENT } else { GREEN });
                canvas.fill_disc(&tracer.x, if followed { 4.0 } else { 2.0 }, WHITE);
            }
        }

        if self.cfg.show_streaklines {
            for line in self.streaklines() {
                canvas.draw_polyline(line.iter(), ACCENT);
            }
            for s in &self.streaks {
                canvas.fill_disc(&s.x, 1.5, ACCENT);
            }
            for inj in &self.injectors {
                canvas.fill_disc(&inj.x, 5.0, RED);
            }
        }
    }

    fn reset(&mut self) {
        self.t = 0.0;
        self.emit_clock = 0.0;
        self.rng = StdRng::seed_from_u64(self.params.seed);
        self.tracers = (0..self.params.particle_count)
            .map(|_| Particle::new(self.domain.random_point(&mut self.rng), self.params.lifetime, self.params.trail_length))
            .collect();
        self.injectors = self.cfg.injectors.iter().map(|p| Injector { x: NVec2::new(p[0], p[1]) }).collect();
        self.streaks.clear();
        self.mode = InteractionMode::None;
        info!(tracers = self.tracers.len(), injectors = self.injectors.len(), "kinematics reset");
    }

    fn status(&self) -> String {
        format!(
            "t = {:.2}  tracers = {}  streak particles = {}  {}",
            self.t,
            self.tracers.len(),
            self.streaks.len(),
            self.field.formula()
        )
    }

    fn pointer_down(&mut self, p: NVec2) {
        match self.mode {
            InteractionMode::AwaitingInjector => {
                self.add_injector(p);
                self.mode = InteractionMode::None;
            }
            InteractionMode::Following(_) => {
                self.follow_nearest(p);
            }
            InteractionMode::None => self.add_tracer(p),
        }
    }

    fn resize(&mut self, _width: usize, _height: usize) {
        // world coordinates are independent of the raster; nothing to rebuild
    }
}
