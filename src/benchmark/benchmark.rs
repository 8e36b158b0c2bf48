use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::configuration::config::{BoundaryConfig, FlowPreset, IntegratorConfig};
use crate::expression::{differentiate, parse};
use crate::simulation::engine::Engine;
use crate::simulation::fields::{ExpressionField, FieldSet, FlowParams, PresetField};
use crate::simulation::integrator::advect;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Domain, NVec2, Particle};

/// Helper to build `n` tracers on deterministic positions, no rand needed
fn make_tracers(n: usize, domain: &Domain, trail_length: usize) -> Vec<Particle> {
    (0..n)
        .map(|i| {
            let i_f = i as f64;
            let x = NVec2::new((i_f * 0.37).sin(), (i_f * 0.13).cos());
            Particle::new(domain.center() + 0.45 * domain.width() * x, f64::INFINITY, trail_length)
        })
        .collect()
}

/// Helper to build a preset field plus a typed perturbation
fn make_field() -> FieldSet {
    let constants = Default::default();
    let (typed, _) = ExpressionField::lenient("0.1*sin(y - t)", "0.1*cos(x)", &constants);
    FieldSet::new()
        .with(PresetField::new(FlowPreset::Spiral, FlowParams::default()))
        .with(typed)
}

/// Time `steps` advection frames of `n` tracers, in ms per frame
fn time_advection(n: usize, steps: usize, integrator: IntegratorConfig) -> f64 {
    let domain = Domain::centered(5.0);
    let field = make_field();
    let engine = Engine {
        integrator,
        boundary: BoundaryConfig::Respawn,
    };
    let params = Parameters {
        particle_count: n,
        ..Parameters::default()
    };
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut tracers = make_tracers(n, &domain, params.trail_length);

    // Warm-up
    advect(&mut tracers, &field, &domain, &engine, &params, 0.0, &mut rng);

    let t0 = Instant::now();
    for k in 0..steps {
        advect(&mut tracers, &field, &domain, &engine, &params, k as f64 * params.dt, &mut rng);
    }
    t0.elapsed().as_secs_f64() * 1000.0 / steps.max(1) as f64
}

/// Euler vs midpoint frame cost for a few tracer counts
pub fn bench_advection() {
    let ns = [200, 400, 800, 1600, 3200, 6400, 12800];
    let steps = 20;

    for n in ns {
        let euler = time_advection(n, steps, IntegratorConfig::Euler);
        let midpoint = time_advection(n, steps, IntegratorConfig::Midpoint);
        println!("N = {n:5}, euler frame = {euler:8.4} ms,   midpoint frame = {midpoint:8.4} ms");
    }
}

/// Same measurement over a finer range of n
/// Paste output directly into a spreadsheet to graph
pub fn bench_advection_curve() {
    println!("N,euler_ms,midpoint_ms");

    for n in (200..=12800).step_by(200) {
        // Small n: average over more frames to smooth noise
        let steps = if n <= 2000 { 20 } else { 5 };
        let euler = time_advection(n, steps, IntegratorConfig::Euler);
        let midpoint = time_advection(n, steps, IntegratorConfig::Midpoint);
        println!("{},{:.6},{:.6}", n, euler, midpoint);
    }
}

/// Parse + differentiate cost of a typical displacement component
pub fn bench_symbolic() {
    let sources = ["0.1*x", "x^2*y - sin(z)", "exp(-x^2 - y^2)*cos(3*z)", "k*(x*y + y*z + z*x)^2"];

    for src in sources {
        let reps = 200;
        let t0 = Instant::now();
        for _ in 0..reps {
            if let Ok(e) = parse(src) {
                for var in ["x", "y", "z"] {
                    let _ = differentiate(&e, var);
                }
            }
        }
        let us = t0.elapsed().as_secs_f64() * 1e6 / reps as f64;
        println!("{src:32} gradient = {us:10.2} us");
    }
}
