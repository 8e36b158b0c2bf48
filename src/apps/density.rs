//! Discrete particles vs continuum density
//!
//! N particles bounce around a closed box. The user drags out a control
//! volume; its density (count / area * 1000) fluctuates wildly for small
//! volumes and settles on the box-wide value as the volume grows.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::configuration::config::DensityConfig;
use crate::simulation::animation::FrameApp;
use crate::simulation::integrator::drift_reflect;
use crate::simulation::params::Parameters;
use crate::simulation::states::{ControlVolume, Domain, NVec2, Particle};
use crate::visualization::canvas::{Canvas, ACCENT, BACKGROUND, GRID, WHITE};
use crate::visualization::heatmap::ColorRamp;

/// Densities are reported per 1000 units of area
pub const DENSITY_SCALE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensitySample {
    pub count: usize,
    pub area: f64,
    pub density: f64,
    pub deviation: f64, // relative to the global density
}

pub struct DensityApp {
    domain: Domain,
    params: Parameters,
    cfg: DensityConfig,
    rng: StdRng,
    pub t: f64,
    pub particles: Vec<Particle>,
    pub control_volume: Option<ControlVolume>,
    drag_start: Option<NVec2>,
    history: VecDeque<DensitySample>,
}

impl DensityApp {
    pub fn new(domain: Domain, params: Parameters, cfg: DensityConfig) -> Self {
        let mut app = Self {
            domain,
            rng: StdRng::seed_from_u64(params.seed),
            params,
            cfg,
            t: 0.0,
            particles: Vec::new(),
            control_volume: None,
            drag_start: None,
            history: VecDeque::new(),
        };
        app.reset();
        app
    }

    /// Box-wide density, N / area * 1000
    pub fn global_density(&self) -> f64 {
        self.particles.len() as f64 / self.domain.area() * DENSITY_SCALE
    }

    pub fn sample_volume(&self, cv: &ControlVolume) -> DensitySample {
        let count = self.particles.iter().filter(|p| cv.contains(&p.x)).count();
        let area = cv.area();
        let density = if area > 0.0 { count as f64 / area * DENSITY_SCALE } else { 0.0 };
        let global = self.global_density();
        let deviation = if global > 0.0 { (density - global) / global } else { 0.0 };
        DensitySample { count, area, density, deviation }
    }

    /// Sample the current control volume, if one is defined
    pub fn sample(&self) -> Option<DensitySample> {
        self.control_volume.as_ref().map(|cv| self.sample_volume(cv))
    }

    /// Densities of centered squares of each size around `center`
    pub fn density_vs_size(&self, center: NVec2, sizes: &[f64]) -> Vec<DensitySample> {
        sizes.iter().map(|&s| self.sample_volume(&ControlVolume::square(center, s))).collect()
    }

    pub fn history(&self) -> impl Iterator<Item = &DensitySample> {
        self.history.iter()
    }

    /// Neighbor count within `radius` as each particle's visual weight
    pub fn update_weights(&mut self, radius: f64) {
        let r2 = radius * radius;
        let positions: Vec<NVec2> = self.particles.iter().map(|p| p.x).collect();
        for (i, particle) in self.particles.iter_mut().enumerate() {
            let neighbors = positions
                .iter()
                .enumerate()
                .filter(|(j, q)| *j != i && (*q - particle.x).norm_squared() <= r2)
                .count();
            particle.weight = neighbors as f64;
        }
    }

    pub fn set_control_volume(&mut self, a: NVec2, b: NVec2) {
        self.control_volume = Some(ControlVolume::from_corners(a, b));
        self.history.clear();
    }

    pub fn clear_control_volume(&mut self) {
        self.control_volume = None;
        self.history.clear();
    }
}

impl FrameApp for DensityApp {
    fn name(&self) -> &'static str {
        "density"
    }

    fn update(&mut self, dt: f64) {
        drift_reflect(&mut self.particles, &self.domain, dt);
        self.update_weights(self.cfg.weight_radius);
        if let Some(sample) = self.sample() {
            self.history.push_back(sample);
            while self.history.len() > self.cfg.history {
                self.history.pop_front();
            }
        }
        self.t += dt;
    }

    fn render(&self, canvas: &mut Canvas) {
        canvas.clear(BACKGROUND);
        canvas.draw_rect_outline(&self.domain.min, &self.domain.max, GRID);

        let max_weight = self.particles.iter().map(|p| p.weight).fold(1.0, f64::max);
        let radius_px = self.cfg.particle_radius * canvas.viewport.scale();
        for p in &self.particles {
            canvas.fill_disc(&p.x, radius_px, ColorRamp::Viridis.color(p.weight / max_weight));
        }

        if let Some(cv) = &self.control_volume {
            canvas.draw_rect_outline(&cv.min, &cv.max, ACCENT);
        }

        // density history along the bottom strip, global density as the midline
        let global = self.global_density();
        if self.history.len() > 1 && global > 0.0 {
            let strip = 0.15 * self.domain.height();
            let base = self.domain.min.y + 0.5 * strip;
            let n = self.cfg.history.max(2) as f64;
            let points: Vec<NVec2> = self
                .history
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let x = self.domain.min.x + self.domain.width() * i as f64 / (n - 1.0);
                    let y = base + 0.5 * strip * s.deviation.clamp(-1.0, 1.0);
                    NVec2::new(x, y)
                })
                .collect();
            canvas.draw_line(&NVec2::new(self.domain.min.x, base), &NVec2::new(self.domain.max.x, base), GRID);
            canvas.draw_polyline(points.iter(), WHITE);
        }
    }

    fn reset(&mut self) {
        self.t = 0.0;
        self.rng = StdRng::seed_from_u64(self.params.seed);
        let (domain, speed) = (self.domain, self.cfg.speed);
        self.particles = (0..self.params.particle_count)
            .map(|_| {
                let angle = self.rng.gen::<f64>() * std::f64::consts::TAU;
                let s = self.rng.gen::<f64>() * speed;
                Particle::new(domain.random_point(&mut self.rng), f64::INFINITY, 0)
                    .with_velocity(NVec2::new(s * angle.cos(), s * angle.sin()))
            })
            .collect();
        self.control_volume = self
            .cfg
            .control_volume
            .map(|[x0, y0, x1, y1]| ControlVolume::from_corners(NVec2::new(x0, y0), NVec2::new(x1, y1)));
        self.drag_start = None;
        self.history.clear();
        self.update_weights(self.cfg.weight_radius);
        info!(particles = self.particles.len(), global_density = self.global_density(), "density sampler reset");
    }

    fn status(&self) -> String {
        match self.sample() {
            Some(s) => format!(
                "global = {:.2}  volume: n = {} area = {:.3} density = {:.2} ({:+.1}%)",
                self.global_density(),
                s.count,
                s.area,
                s.density,
                100.0 * s.deviation
            ),
            None => format!("global = {:.2}  drag to define a control volume", self.global_density()),
        }
    }

    fn pointer_down(&mut self, p: NVec2) {
        self.drag_start = Some(self.domain.clamp(p));
        self.clear_control_volume();
    }

    fn pointer_move(&mut self, p: NVec2) {
        if let Some(start) = self.drag_start {
            self.control_volume = Some(ControlVolume::from_corners(start, self.domain.clamp(p)));
        }
    }

    fn pointer_up(&mut self, p: NVec2) {
        if let Some(start) = self.drag_start.take() {
            let end = self.domain.clamp(p);
            if (end - start).norm() > 1e-9 {
                self.set_control_volume(start, end);
            }
        }
    }
}
