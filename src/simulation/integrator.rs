//! Fixed-step particle advection
//!
//! Provides forward-Euler and midpoint displacement steps through a
//! [`VelocityField`], plus the per-frame `advect` pass that ages particles,
//! records trails and applies the boundary policy.

use rand::Rng;
use tracing::warn;

use super::engine::Engine;
use super::fields::VelocityField;
use super::params::Parameters;
use super::states::{Domain, NVec2, Particle};
use crate::configuration::config::{BoundaryConfig, IntegratorConfig};

/// Displacement of a point over one step `dt` starting at time `t`
/// Non-finite results collapse to zero displacement
pub fn displacement<F>(field: &F, p: &NVec2, t: f64, dt: f64, method: IntegratorConfig) -> NVec2
where
    F: VelocityField + ?Sized,
{
    let d = match method {
        // x_n+1 = x_n + dt v(x_n, t_n)
        IntegratorConfig::Euler => dt * field.velocity(p, t),

        // x_mid = x_n + dt/2 v(x_n, t_n)
        // x_n+1 = x_n + dt v(x_mid, t_n + dt/2)
        IntegratorConfig::Midpoint => {
            let half_dt = 0.5 * dt;
            let mid = p + half_dt * field.velocity(p, t);
            dt * field.velocity(&mid, t + half_dt)
        }
    };

    if d.x.is_finite() && d.y.is_finite() {
        d
    } else {
        NVec2::zeros()
    }
}

/// Trajectory of a single point over `steps` steps (pathline of one tracer)
pub fn integrate_path<F>(field: &F, start: NVec2, t0: f64, dt: f64, steps: usize, method: IntegratorConfig) -> Vec<NVec2>
where
    F: VelocityField + ?Sized,
{
    let mut out = Vec::with_capacity(steps + 1);
    let mut p = start;
    let mut t = t0;
    out.push(p);
    for _ in 0..steps {
        p += displacement(field, &p, t, dt, method);
        t += dt;
        out.push(p);
    }
    out
}

/// Per-step bookkeeping from [`advect`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvectStats {
    pub moved: usize,
    pub respawned: usize,
    pub reflected: usize,
    pub non_finite: usize,
}

/// Reflect a particle back inside `domain`: clamp its position and invert the
/// velocity component that carried it out
pub fn reflect(particle: &mut Particle, domain: &Domain) -> bool {
    let clamped = domain.clamp(particle.x);
    if clamped == particle.x {
        return false;
    }
    if let Some(v) = particle.v.as_mut() {
        if clamped.x != particle.x.x {
            v.x = -v.x;
        }
        if clamped.y != particle.x.y {
            v.y = -v.y;
        }
    }
    particle.x = clamped;
    true
}

/// Advance every particle by one step of `params.dt` at time `t`
/// Particles that leave the domain are reflected or respawned per `engine.boundary`;
/// particles older than their lifetime are respawned
pub fn advect<F, R>(
    particles: &mut [Particle],
    field: &F,
    domain: &Domain,
    engine: &Engine,
    params: &Parameters,
    t: f64,
    rng: &mut R,
) -> AdvectStats
where
    F: VelocityField + ?Sized,
    R: Rng + ?Sized,
{
    let dt = params.dt;
    let mut stats = AdvectStats::default();

    for particle in particles.iter_mut() {
        let d = displacement(field, &particle.x, t, dt, engine.integrator);
        if d == NVec2::zeros() && !field.velocity(&particle.x, t).iter().all(|c| c.is_finite()) {
            stats.non_finite += 1;
        }

        particle.x += d;
        particle.age += dt;
        stats.moved += 1;

        if !domain.contains(&particle.x) || !particle.x.iter().all(|c| c.is_finite()) {
            match engine.boundary {
                BoundaryConfig::Reflect if particle.x.iter().all(|c| c.is_finite()) => {
                    reflect(particle, domain);
                    stats.reflected += 1;
                }
                _ => {
                    particle.respawn_at(domain.random_point(rng));
                    stats.respawned += 1;
                    continue;
                }
            }
        }

        if particle.expired() {
            particle.respawn_at(domain.random_point(rng));
            stats.respawned += 1;
            continue;
        }

        particle.trail.push(particle.x);
    }

    if stats.non_finite > 0 {
        warn!(count = stats.non_finite, t, "non-finite velocity, particles held in place");
    }

    stats
}

/// Advance free-moving particles (own velocity, no field) and reflect them
/// off the domain walls. Used by the density sampler's closed box.
pub fn drift_reflect(particles: &mut [Particle], domain: &Domain, dt: f64) -> usize {
    let mut reflected = 0;
    for particle in particles.iter_mut() {
        if let Some(v) = particle.v {
            particle.x += dt * v;
        }
        particle.age += dt;
        if !domain.contains(&particle.x) && reflect(particle, domain) {
            reflected += 1;
        }
    }
    reflected
}
