use std::collections::BTreeMap;
use std::f64::consts::TAU;

use cmviz::apps::deformation::{Deformation, DeformationApp};
use cmviz::apps::density::DensityApp;
use cmviz::apps::euler_lagrange::{EulerLagrangeApp, FollowMode};
use cmviz::apps::kinematics::{trace_streamline_both, KinematicsApp};
use cmviz::apps::mean_free_path::{resolve_collision, MeanFreePathApp};
use cmviz::apps::meniscus::{MeniscusApp, MeniscusParams, DERIVATION_STEPS};
use cmviz::configuration::config::{
    BoundaryConfig, CollisionsConfig, DeformationConfig, DensityConfig, FlowPreset, IntegratorConfig, KinematicsConfig,
    MeniscusConfig, ScenarioConfig,
};
use cmviz::simulation::animation::{AnimationLoop, FrameApp, PlayState};
use cmviz::simulation::engine::Engine;
use cmviz::simulation::fields::{
    finite_difference_divergence, ExpressionField, FieldSet, FlowParams, PresetField, VelocityField, VORTEX_CORE_RADIUS,
};
use cmviz::simulation::integrator::{advect, integrate_path};
use cmviz::simulation::params::Parameters;
use cmviz::simulation::scenario::{build_field_set, DeformationScene, Scenario};
use cmviz::simulation::states::{Body, Domain, NVec2, NVec3, Particle};
use cmviz::visualization::canvas::{Canvas, BACKGROUND, WHITE};
use cmviz::visualization::heatmap::{ColorRamp, Metric, ScalarGrid};
use cmviz::{differentiate, parse, simplify, Bindings, ExpressionError, SimError};

const ALL_PRESETS: [FlowPreset; 9] = [
    FlowPreset::Uniform,
    FlowPreset::Rotation,
    FlowPreset::Shear,
    FlowPreset::Stagnation,
    FlowPreset::Vortex,
    FlowPreset::RadialExpansion,
    FlowPreset::Spiral,
    FlowPreset::CompressionWave,
    FlowPreset::Oscillating,
];

/// Single preset with non-trivial parameters
pub fn preset(p: FlowPreset) -> FieldSet {
    FieldSet::new().with(PresetField::new(
        p,
        FlowParams {
            strength: 1.3,
            rate: 0.7,
            omega: 2.0,
        },
    ))
}

/// Default test parameters with a given step
pub fn test_params(dt: f64) -> Parameters {
    Parameters {
        dt,
        particle_count: 50,
        lifetime: 100.0,
        trail_length: 10,
        seed: 7,
    }
}

pub fn engine(integrator: IntegratorConfig, boundary: BoundaryConfig) -> Engine {
    Engine { integrator, boundary }
}

fn body(x: [f64; 2], v: [f64; 2], m: f64, radius: f64) -> Body {
    Body {
        x: NVec2::new(x[0], x[1]),
        v: NVec2::new(v[0], v[1]),
        m,
        radius,
    }
}

fn eval_at(src: &str, bindings: &Bindings) -> f64 {
    parse(src).and_then(|e| e.eval(bindings)).unwrap()
}

// ==================================================================================
// Velocity field tests
// ==================================================================================

#[test]
fn preset_divergence_matches_finite_differences() {
    let points = [
        NVec2::new(0.8, -0.3),
        NVec2::new(-1.7, 2.2),
        NVec2::new(3.1, 0.4),
        NVec2::new(-0.2, -2.5),
    ];
    for p in ALL_PRESETS {
        let field = preset(p);
        for x in &points {
            for t in [0.0, 0.9] {
                let exact = field.divergence(x, t);
                let fd = finite_difference_divergence(&field, x, t, 1e-4);
                assert!((exact - fd).abs() < 1e-3, "{p:?} at {x:?}: closed form {exact}, finite difference {fd}");
            }
        }
    }
}

#[test]
fn vortex_core_is_guarded() {
    let field = preset(FlowPreset::Vortex);
    let v = field.velocity(&NVec2::zeros(), 0.0);
    assert_eq!(v, NVec2::zeros());

    let inside = NVec2::new(0.5 * VORTEX_CORE_RADIUS, 0.0);
    assert_eq!(field.velocity(&inside, 0.0), NVec2::zeros());

    let outside = NVec2::new(2.0 * VORTEX_CORE_RADIUS, 0.0);
    let v = field.velocity(&outside, 0.0);
    assert!(v.iter().all(|c| c.is_finite()));
    assert!(v.y > 0.0, "counter-clockwise for positive circulation");
}

#[test]
fn field_set_superposes_terms() {
    let set = FieldSet::new()
        .with(PresetField::new(FlowPreset::Uniform, FlowParams { strength: 2.0, ..FlowParams::default() }))
        .with(PresetField::new(FlowPreset::RadialExpansion, FlowParams { strength: 0.5, ..FlowParams::default() }));
    let p = NVec2::new(1.0, 2.0);
    assert_eq!(set.velocity(&p, 0.0), NVec2::new(2.5, 1.0));
    assert!((set.divergence(&p, 0.0) - 1.0).abs() < 1e-12);
    assert!(set.formula().contains("  +  "));
    assert_eq!(FieldSet::new().velocity(&p, 3.0), NVec2::zeros());
}

#[test]
fn expression_field_matches_preset() {
    let mut constants = BTreeMap::new();
    constants.insert("a".to_string(), 1.3);
    let typed = ExpressionField::new("-a*y", "a*x", &constants).unwrap();
    let rotation = preset(FlowPreset::Rotation);
    let p = NVec2::new(0.4, -1.1);
    assert!((typed.velocity(&p, 0.0) - rotation.velocity(&p, 0.0)).norm() < 1e-12);
    assert!(typed.divergence_expr().unwrap().is_zero());
}

#[test]
fn expression_field_rejects_unknown_symbols_strictly_and_zeroes_leniently() {
    let constants = BTreeMap::new();
    assert_eq!(
        ExpressionField::new("q*x", "0", &constants).err(),
        Some(ExpressionError::UnboundVariable("q".to_string()))
    );

    let (field, err) = ExpressionField::lenient("x +* 2", "y", &constants);
    assert!(err.is_some());
    let v = field.velocity(&NVec2::new(3.0, 4.0), 0.0);
    assert_eq!(v, NVec2::new(0.0, 4.0));
}

// ==================================================================================
// Integrator tests
// ==================================================================================

#[test]
fn rotation_returns_to_start_after_one_revolution() {
    let field = preset(FlowPreset::Rotation);
    let omega = 1.3; // angular velocity equals the strength
    let steps = 2000;
    let dt = TAU / omega / steps as f64;
    let start = NVec2::new(1.0, 0.0);

    let path = integrate_path(&field, start, 0.0, dt, steps, IntegratorConfig::Midpoint);
    let end = path[path.len() - 1];
    assert!((end - start).norm() < 1e-3, "midpoint drifted to {end:?}");

    let euler = integrate_path(&field, start, 0.0, dt, steps, IntegratorConfig::Euler);
    let drift = (euler[euler.len() - 1] - start).norm();
    assert!(drift > (end - start).norm(), "euler should spiral outward more than midpoint");
}

#[test]
fn unit_rotation_returns_to_start_at_two_pi() {
    // u = -y, v = x has period 2*pi
    let (field, err) = ExpressionField::lenient("-y", "x", &BTreeMap::new());
    assert!(err.is_none());
    let steps = 4000;
    let start = NVec2::new(1.5, -0.5);

    let path = integrate_path(&field, start, 0.0, TAU / steps as f64, steps, IntegratorConfig::Midpoint);
    let end = path[path.len() - 1];
    assert!((end - start).norm() < 1e-3, "ended at {end:?}");
}

#[test]
fn edge_particles_respawn_without_nan() {
    let domain = Domain::centered(1.0);
    // blows up near the edge and is singular on the axes
    let mut constants = BTreeMap::new();
    constants.insert("s".to_string(), 50.0);
    let (typed, _) = ExpressionField::lenient("s/x", "s/y", &constants);
    let field = FieldSet::new().with(typed).with(PresetField::new(FlowPreset::Vortex, FlowParams::default()));
    let params = test_params(0.05);
    let mut rng = rand::rngs::mock::StepRng::new(0, 1 << 40);

    let mut particles = vec![
        Particle::new(NVec2::new(1.0, 1.0), params.lifetime, params.trail_length),
        Particle::new(NVec2::new(-1.0, 0.0), params.lifetime, params.trail_length),
        Particle::new(NVec2::new(0.0, 0.0), params.lifetime, params.trail_length),
    ];

    for boundary in [BoundaryConfig::Respawn, BoundaryConfig::Reflect] {
        let engine = engine(IntegratorConfig::Midpoint, boundary);
        for k in 0..50 {
            advect(&mut particles, &field, &domain, &engine, &params, k as f64 * params.dt, &mut rng);
            for p in &particles {
                assert!(p.x.iter().all(|c| c.is_finite()), "{boundary:?}: {:?}", p.x);
                assert!(domain.contains(&p.x), "{boundary:?}: {:?} left the domain", p.x);
            }
        }
    }
}

#[test]
fn trails_stay_bounded() {
    let domain = Domain::centered(5.0);
    let field = preset(FlowPreset::Rotation);
    let params = test_params(0.01);
    let engine = Engine::default();
    let mut rng = rand::rngs::mock::StepRng::new(1, 3);
    let mut particles: Vec<Particle> = (0..5)
        .map(|i| Particle::new(NVec2::new(0.5 * i as f64, 0.0), f64::INFINITY, params.trail_length))
        .collect();

    for k in 0..200 {
        advect(&mut particles, &field, &domain, &engine, &params, k as f64 * params.dt, &mut rng);
    }
    for p in &particles {
        assert_eq!(p.trail.len(), params.trail_length);
        assert_eq!(p.trail.points().last(), Some(&p.x));
    }
}

#[test]
fn expired_particles_respawn() {
    let domain = Domain::centered(5.0);
    let field = preset(FlowPreset::Uniform);
    let params = Parameters { lifetime: 0.05, ..test_params(0.02) };
    let engine = Engine::default();
    let mut rng = rand::rngs::mock::StepRng::new(0, 1 << 60);
    let mut particles = vec![Particle::new(NVec2::zeros(), params.lifetime, params.trail_length)];

    let mut respawned = 0;
    for k in 0..10 {
        respawned += advect(&mut particles, &field, &domain, &engine, &params, k as f64 * params.dt, &mut rng).respawned;
    }
    assert!(respawned >= 3);
    assert!(particles[0].age <= params.lifetime + params.dt);
}

// ==================================================================================
// Kinematics tests
// ==================================================================================

fn kinematics_app(field: FieldSet, cfg: KinematicsConfig) -> KinematicsApp {
    KinematicsApp::new(field, Domain::centered(5.0), Engine::default(), test_params(0.1), cfg)
}

#[test]
fn streaklines_grow_from_their_injectors() {
    let cfg = KinematicsConfig {
        injectors: vec![[-4.0, 0.0], [-4.0, 2.0]],
        emit_interval: 0.1,
        max_streak_particles: 1000,
        ..KinematicsConfig::default()
    };
    let mut app = kinematics_app(preset(FlowPreset::Uniform), cfg);

    for _ in 0..5 {
        app.update(0.1);
    }
    let lines = app.streaklines();
    assert_eq!(lines.len(), 2);
    for (line, y) in lines.iter().zip([0.0, 2.0]) {
        assert_eq!(line[0], NVec2::new(-4.0, y));
        assert_eq!(line.len(), 1 + 5);
        // newest first, so x only grows along the line
        assert!(line.windows(2).all(|w| w[1].x >= w[0].x));
    }
}

#[test]
fn streak_particle_count_is_capped() {
    let cfg = KinematicsConfig {
        injectors: vec![[0.0, 0.0]],
        emit_interval: 0.01,
        max_streak_particles: 25,
        ..KinematicsConfig::default()
    };
    let mut app = kinematics_app(preset(FlowPreset::Rotation), cfg);
    for _ in 0..100 {
        app.update(0.02);
    }
    assert_eq!(app.streak_particles().count(), 25);
}

#[test]
fn streak_emission_keeps_its_cadence() {
    let cfg = KinematicsConfig {
        injectors: vec![[0.0, 0.0]],
        emit_interval: 0.75,
        ..KinematicsConfig::default()
    };
    let mut app = kinematics_app(FieldSet::new(), cfg);
    for _ in 0..6 {
        app.update(0.5);
    }
    // 3 s of emission every 0.75 s
    assert_eq!(app.streak_particles().count(), 4);

    app.set_field(preset(FlowPreset::Uniform));
    assert_eq!(app.field().len(), 1);
    app.update(0.5);
    assert!(app.streak_particles().all(|p| p.x.x > 0.0));
}

#[test]
fn streamline_of_rotation_closes() {
    let field = preset(FlowPreset::Rotation);
    let domain = Domain::centered(5.0);
    let line = trace_streamline_both(&field, NVec2::new(2.0, 0.0), 0.0, 0.05, 2000, &domain);
    assert!(line.len() > 100);
    for p in &line {
        assert!((p.norm() - 2.0).abs() < 1e-2, "{p:?} strayed off the circle");
    }
    assert_eq!(line.last(), Some(&NVec2::new(2.0, 0.0)));
}

#[test]
fn clicks_drop_tracers_and_injectors() {
    let mut app = kinematics_app(preset(FlowPreset::Shear), KinematicsConfig::default());
    let before = app.tracers.len();
    app.pointer_down(NVec2::new(1.0, 1.0));
    assert_eq!(app.tracers.len(), before + 1);

    app.request_injector();
    app.pointer_down(NVec2::new(9.0, 0.0));
    let last = app.injectors.last().unwrap();
    assert_eq!(last.x, NVec2::new(5.0, 0.0), "injector clamped into the domain");

    app.reset();
    assert_eq!(app.tracers.len(), before);
    assert_eq!(app.streak_particles().count(), 0);
}

// ==================================================================================
// Density tests
// ==================================================================================

#[test]
fn global_density_is_constant() {
    let domain = Domain::centered(5.0);
    let params = Parameters { particle_count: 400, ..test_params(0.02) };
    let mut app = DensityApp::new(domain, params, DensityConfig::default());

    let initial = app.global_density();
    assert!((initial - 400.0 / 100.0 * 1000.0).abs() < 1e-9);
    for _ in 0..300 {
        app.update(0.02);
    }
    assert_eq!(app.global_density(), initial);
    assert!(app.particles.iter().all(|p| domain.contains(&p.x)));
}

#[test]
fn whole_box_sample_matches_global_density() {
    let domain = Domain::centered(5.0);
    let mut app = DensityApp::new(domain, test_params(0.02), DensityConfig::default());
    app.set_control_volume(domain.min, domain.max);
    let sample = app.sample().unwrap();
    assert_eq!(sample.count, app.particles.len());
    assert!(sample.deviation.abs() < 1e-12);

    // tiny volumes fluctuate, large ones settle
    let sizes = [0.2, 1.0, 5.0, 10.0];
    let samples = app.density_vs_size(NVec2::zeros(), &sizes);
    assert_eq!(samples.len(), sizes.len());
    assert!(samples[3].deviation.abs() < 1e-12);
}

#[test]
fn dragging_defines_a_control_volume() {
    let mut app = DensityApp::new(Domain::centered(5.0), test_params(0.02), DensityConfig::default());
    app.pointer_down(NVec2::new(1.0, 1.0));
    app.pointer_move(NVec2::new(2.0, -1.0));
    app.pointer_up(NVec2::new(3.0, -1.0));
    let cv = app.control_volume.unwrap();
    assert_eq!(cv.min, NVec2::new(1.0, -1.0));
    assert_eq!(cv.max, NVec2::new(3.0, 1.0));
    assert!((cv.area() - 4.0).abs() < 1e-12);
}

// ==================================================================================
// Collision tests
// ==================================================================================

#[test]
fn collision_conserves_momentum_and_energy() {
    let mut a = body([0.0, 0.0], [1.0, 0.2], 1.0, 0.5);
    let mut b = body([0.8, 0.1], [-0.5, 0.0], 3.0, 0.4);
    let p0 = a.m * a.v + b.m * b.v;
    let e0 = 0.5 * a.m * a.v.norm_squared() + 0.5 * b.m * b.v.norm_squared();

    assert!(resolve_collision(&mut a, &mut b));

    let p1 = a.m * a.v + b.m * b.v;
    let e1 = 0.5 * a.m * a.v.norm_squared() + 0.5 * b.m * b.v.norm_squared();
    assert!((p1 - p0).norm() < 1e-12, "momentum {p0:?} -> {p1:?}");
    assert!((e1 - e0).abs() < 1e-12, "energy {e0} -> {e1}");
    assert!((a.x - b.x).norm() >= a.radius + b.radius - 1e-12, "bodies still overlap");
}

#[test]
fn separating_bodies_do_not_count() {
    let mut a = body([0.0, 0.0], [-1.0, 0.0], 1.0, 0.5);
    let mut b = body([0.5, 0.0], [1.0, 0.0], 1.0, 0.5);
    assert!(!resolve_collision(&mut a, &mut b));
    assert_eq!(a.v, NVec2::new(-1.0, 0.0));
    assert_eq!(b.v, NVec2::new(1.0, 0.0));

    let mut far = body([3.0, 0.0], [-1.0, 0.0], 1.0, 0.5);
    assert!(!resolve_collision(&mut a, &mut far));
}

#[test]
fn mean_free_path_round_lifecycle() {
    let cfg = CollisionsConfig { time_limit: 1.0, ..CollisionsConfig::default() };
    let mut app = MeanFreePathApp::new(Domain::centered(5.0), cfg, 3);
    assert_eq!(app.state, PlayState::Idle);
    assert_eq!(app.displacement_per_collision(), f64::INFINITY);

    // nothing moves before the first click
    app.update(0.1);
    assert_eq!(app.elapsed(), 0.0);

    app.pointer_down(NVec2::new(4.0, 0.0));
    assert_eq!(app.state, PlayState::Playing);
    for _ in 0..200 {
        app.update(0.01);
    }
    assert_eq!(app.state, PlayState::Ended);
    assert!(app.path_length() >= 0.0);

    app.pointer_down(NVec2::zeros());
    assert_eq!(app.state, PlayState::Idle);
    assert_eq!(app.collisions, 0);
}

/// One heavy obstacle right of the player; the player bounces between it and the left wall
fn head_on_round() -> MeanFreePathApp {
    let cfg = CollisionsConfig {
        obstacles: 1,
        time_limit: 100.0,
        ..CollisionsConfig::default()
    };
    let mut app = MeanFreePathApp::new(Domain::centered(5.0), cfg, 11);
    app.system.bodies = vec![body([0.0, 0.0], [2.0, 0.0], 1.0, 0.2), body([2.0, 0.0], [0.0, 0.0], 1e9, 0.25)];
    app.start();
    app
}

#[test]
fn mean_free_path_counts_head_on_collisions() {
    let mut app = head_on_round();
    let dt = 0.01;

    let mut frames = 0;
    while app.collisions == 0 && frames < 1000 {
        app.update(dt);
        frames += 1;
    }
    assert_eq!(app.collisions, 1);
    // first contact after about 2 - (0.2 + 0.25) of travel
    let first = app.mean_free_path();
    assert!((first - 1.55).abs() < 2.0 * 2.0 * dt, "first free path {first}");
    assert_eq!(first, app.path_length());
    assert!(app.player().v.x < 0.0, "player bounced back");
    let expected = app.player().x.norm();
    assert!((app.displacement_per_collision() - expected).abs() < 1e-12);

    // back off the left wall and into the obstacle again
    while app.collisions == 1 && frames < 5000 {
        app.update(dt);
        frames += 1;
    }
    assert_eq!(app.collisions, 2);
    assert!((app.mean_free_path() - app.path_length() / 2.0).abs() < 1e-9);
    assert!(app.mean_free_path() > first, "second segment runs to the wall and back");
    assert!((app.displacement_per_collision() - app.player().x.norm() / 2.0).abs() < 1e-12);
    assert!(app.displacement_per_collision().is_finite());
}

// ==================================================================================
// Expression tests
// ==================================================================================

#[test]
fn parser_respects_precedence() {
    let b = Bindings::new().with("x", 3.0);
    assert_eq!(eval_at("2 + 3*4", &b), 14.0);
    assert_eq!(eval_at("2^3^2", &b), 512.0);
    assert_eq!(eval_at("-2^2", &b), -4.0);
    assert_eq!(eval_at("2x", &b), 6.0);
    assert_eq!(eval_at("(1 + x)(x - 1)", &b), 8.0);
    assert_eq!(eval_at("max(x, 5) - min(1, x)", &b), 4.0);
    assert!((eval_at("sin(pi/2) + ln(e)", &b) - 2.0).abs() < 1e-12);
}

#[test]
fn parser_reports_errors() {
    assert_eq!(parse("x +"), Err(ExpressionError::UnexpectedEnd));
    assert_eq!(parse("foo(x)"), Err(ExpressionError::UnknownFunction("foo".to_string())));
    assert!(matches!(parse("x $ 2"), Err(ExpressionError::UnexpectedChar { ch: '$', .. })));
    assert!(matches!(parse("sin(x, y)"), Err(ExpressionError::Arity { .. })));
    assert!(parse("(x + 1").is_err());
    assert!(parse("x y )").is_err());
    assert_eq!(
        parse("q").unwrap().eval(&Bindings::new()),
        Err(ExpressionError::UnboundVariable("q".to_string()))
    );
}

#[test]
fn simplify_collects_like_terms() {
    let s = |src: &str| simplify(&parse(src).unwrap()).to_string();
    assert_eq!(s("x + x"), "2*x");
    assert_eq!(s("x*x"), "x^2");
    assert_eq!(s("k - k"), "0");
    assert_eq!(s("0*sin(x) + 1*y"), "y");
    assert_eq!(s("2*3 + 4"), "10");
    assert_eq!(s("(x*y)/x"), "y");
}

#[test]
fn derivatives_match_textbook_rules() {
    let d = |src: &str, var: &str| differentiate(&parse(src).unwrap(), var).unwrap();
    assert_eq!(d("x^2", "x").to_string(), "2*x");
    assert_eq!(d("sin(x)", "x").to_string(), "cos(x)");
    assert_eq!(d("3*y", "x").to_string(), "0");

    // check the rest numerically against central differences
    let b = Bindings::new().with("x", 0.7).with("y", -0.4);
    for src in [
        "x^2*y - sin(x*y)",
        "exp(-x^2)/(1 + y^2)",
        "sqrt(x)*ln(x)",
        "atan(x/y)",
        "asin(x/2)*atan(x^2)",
        "acos(x) + tan(x)",
        "abs(x - 1)*log10(x)",
        "x^x",
        "2^x",
        "e^(x*y)",
        "tanh(3*x) + cosh(x)",
    ] {
        let e = parse(src).unwrap();
        let exact = d(src, "x").eval(&b).unwrap();
        let h = 1e-6;
        let fd = (e.eval(&b.clone().with("x", 0.7 + h)).unwrap() - e.eval(&b.clone().with("x", 0.7 - h)).unwrap()) / (2.0 * h);
        assert!((exact - fd).abs() < 1e-5, "d/dx {src}: {exact} vs {fd}");
    }

    assert!(matches!(
        differentiate(&parse("min(x, 1)").unwrap(), "x"),
        Err(ExpressionError::NotDifferentiable(_))
    ));
}

#[test]
fn simplify_keeps_decimals_and_odd_names() {
    let b = Bindings::new().with("x", 1.0).with("s0", 1.0).with("a1", 2.0);

    let e = simplify(&parse("0.1*x + 0.2*x").unwrap());
    assert!((e.eval(&b).unwrap() - 0.3).abs() < 1e-12, "{e}");

    // names that look like internal placeholders come back as themselves
    let e = simplify(&parse("s0 + a1 + s0").unwrap());
    assert_eq!(e.variables(), vec!["a1".to_string(), "s0".to_string()]);
    assert!((e.eval(&b).unwrap() - 4.0).abs() < 1e-12);

    // unknown-to-calculus functions survive simplification
    let e = simplify(&parse("max(x, 2) + 0").unwrap());
    assert_eq!(e.eval(&b).unwrap(), 2.0);
}

// ==================================================================================
// Deformation tests
// ==================================================================================

#[test]
fn rigid_rotation_has_zero_strain() {
    let (def, err) = Deformation::compute("-k*y", "k*x", "0");
    assert!(err.is_none());
    assert!(def.strain.is_zero(), "strain = {}", def.strain.to_latex());

    let b = Bindings::new().with("k", 2.0);
    let w = def.rotation.evaluate(&NVec3::new(0.3, 0.1, -0.2), &b);
    assert!((w[(0, 1)] + 2.0).abs() < 1e-12);
    assert!((w[(1, 0)] - 2.0).abs() < 1e-12);
    assert!((w + w.transpose()).norm() < 1e-12, "rotation is antisymmetric");
}

#[test]
fn uniform_stretch_strain() {
    let (def, _) = Deformation::compute("0.1*x", "0", "0");
    let e = def.strain.evaluate(&NVec3::zeros(), &Bindings::new());
    assert!((e[(0, 0)] - 0.1).abs() < 1e-12);
    assert!((def.strain.trace(&NVec3::new(1.0, 2.0, 3.0), &Bindings::new()) - 0.1).abs() < 1e-12);
    assert!(def.rotation.is_zero());
    assert!(def.strain.to_latex().starts_with("\\begin{bmatrix}"));
}

#[test]
fn bad_components_fall_back_to_zero() {
    let (def, err) = Deformation::compute("x*y", "sin(", "max(x, z)");
    let err = err.unwrap();
    let what: Vec<&str> = err.failures.iter().map(|(w, _)| w.as_str()).collect();
    assert!(what.contains(&"v"));
    assert!(what.contains(&"dw/dx"));

    // u survives untouched
    let g = def.gradient.evaluate(&NVec3::new(2.0, 3.0, 0.0), &Bindings::new());
    assert!((g[(0, 0)] - 3.0).abs() < 1e-12);
    assert!((g[(0, 1)] - 2.0).abs() < 1e-12);
    assert_eq!(g[(1, 0)], 0.0);
}

#[test]
fn deformed_lattice_moves_points() {
    let (def, _) = Deformation::compute("0.1*x", "0", "0");
    let lattice = def.deformed_lattice(3, 1.0, 2.0, &Bindings::new());
    assert_eq!(lattice.len(), 27);
    for (p, q) in &lattice {
        assert!((q.x - p.x * 1.2).abs() < 1e-12);
        assert_eq!(q.y, p.y);
    }

    let mut app = DeformationApp::new("0", "0", "0", Bindings::new(), 3, 1.0, 1.0);
    assert!(app.recalculate("y", "x", "0").is_none());
    assert!(!app.deformation.strain.is_zero());
}

#[test]
fn huge_displacement_renders_without_overflow() {
    let app = DeformationApp::new("1e20*x", "0", "0", Bindings::new(), 4, 1.0, 1.0);
    let mut canvas = Canvas::new(64, 48, app.view_domain());
    app.render(&mut canvas);
    assert_eq!(canvas.pixels().len(), 64 * 48 * 4);
}

#[test]
fn deformation_scene_rescales() {
    let mut scene = DeformationScene::build_scene(&DeformationConfig::default());
    let scale = scene.scale;
    let before = scene.points();
    scene.rescale(2.0);
    assert_eq!(scene.scale, 2.0 * scale);
    scene.rescale(-1.0);
    scene.rescale(f64::NAN);
    assert_eq!(scene.scale, 2.0 * scale);
    assert_eq!(scene.points().len(), before.len());
}

// ==================================================================================
// Heatmap and Euler-Lagrange tests
// ==================================================================================

#[test]
fn heatmap_ranges() {
    let domain = Domain::centered(1.0);

    let div = ScalarGrid::sample(&preset(FlowPreset::Spiral), Metric::Divergence, &domain, 5, 5, 0.0);
    let r = div.range(true);
    assert!((r.min + 1.4).abs() < 1e-12 && (r.max - 1.4).abs() < 1e-12, "{r:?}");

    let speed = ScalarGrid::sample(&preset(FlowPreset::Rotation), Metric::Speed, &domain, 5, 5, 0.0);
    let r = speed.range(false);
    assert_eq!(r.min, 0.0);
    assert!((r.max - 1.3 * 2f64.sqrt()).abs() < 1e-12);

    // constant field: widened so normalization stays finite
    let flat = ScalarGrid::sample(&preset(FlowPreset::Uniform), Metric::Speed, &domain, 4, 4, 0.0);
    let r = flat.range(false);
    assert!(r.max > r.min);
    assert!(r.normalize(1.3).is_finite());
}

#[test]
fn color_ramps_clamp() {
    assert_eq!(ColorRamp::Viridis.color(-3.0), ColorRamp::Viridis.color(0.0));
    assert_eq!(ColorRamp::Viridis.color(f64::NAN), ColorRamp::Viridis.color(0.0));
    assert_eq!(ColorRamp::Viridis.color(7.0), ColorRamp::Viridis.color(1.0));
    assert_eq!(ColorRamp::CoolWarm.color(0.5), [221, 221, 221, 255]);
    assert_ne!(ColorRamp::CoolWarm.color(0.0), ColorRamp::CoolWarm.color(1.0));
}

#[test]
fn euler_lagrange_probes_and_follow() {
    let domain = Domain::centered(5.0);
    let mut app = EulerLagrangeApp::new(
        preset(FlowPreset::Stagnation),
        domain,
        Engine::default(),
        test_params(0.02),
        Some(Metric::Speed),
        [16, 12],
        [4, 3],
    );
    let probes = app.probe_velocities();
    assert_eq!(probes.len(), 12);
    for (p, v) in &probes {
        assert!((v - NVec2::new(1.3 * p.x, -1.3 * p.y)).norm() < 1e-12);
    }
    let grid = app.heatmap().unwrap();
    assert_eq!((grid.nx, grid.ny), (16, 12));

    app.request_follow();
    let target = app.tracers[3].x;
    app.pointer_down(target);
    assert_eq!(app.follow, FollowMode::Following(3));
    assert!(app.followed_velocity().is_some());

    app.stop_following();
    app.set_metric(None);
    assert!(app.heatmap().is_none());
}

#[test]
fn animation_loop_pauses_and_renders() {
    let domain = Domain::centered(5.0);
    let mut app = kinematics_app(preset(FlowPreset::Rotation), KinematicsConfig::default());
    let mut canvas = Canvas::new(64, 48, domain);
    let mut looping = AnimationLoop::new(0.05);

    looping.run_headless(&mut app, &mut canvas, 10);
    assert_eq!(looping.frame, 10);
    assert!((app.t - 0.5).abs() < 1e-12);

    looping.toggle();
    looping.tick(&mut app, &mut canvas);
    assert_eq!(looping.frame, 10);
    assert!((app.t - 0.5).abs() < 1e-12);
    assert_eq!(canvas.pixels().len(), 64 * 48 * 4);
}

#[test]
fn resize_rebuilds_canvas_and_resets_app() {
    let domain = Domain::centered(5.0);
    let mut app = EulerLagrangeApp::new(
        preset(FlowPreset::Rotation),
        domain,
        Engine::default(),
        test_params(0.02),
        Some(Metric::Divergence),
        [8, 8],
        [3, 3],
    );
    let mut canvas = Canvas::new(64, 48, domain);
    let mut looping = AnimationLoop::new(0.02);
    looping.run_headless(&mut app, &mut canvas, 5);
    assert!(app.t > 0.0);

    looping.resize(&mut app, &mut canvas, 80, 60);
    assert_eq!(canvas.pixels().len(), 80 * 60 * 4);
    assert_eq!((canvas.viewport.width, canvas.viewport.height), (80, 60));
    assert_eq!(app.t, 0.0);

    looping.tick(&mut app, &mut canvas);
    assert!(app.t > 0.0);
}

// ==================================================================================
// Canvas tests
// ==================================================================================

#[test]
fn far_off_canvas_lines_are_clipped() {
    let mut canvas = Canvas::new(20, 10, Domain::centered(1.0));
    canvas.clear(BACKGROUND);

    // from a quarter of the way in to far beyond the right edge
    canvas.draw_line(&NVec2::new(-0.5, 0.0), &NVec2::new(1e30, 0.0), WHITE);
    for x in 5..20 {
        assert_eq!(canvas.pixel(x, 5), Some(WHITE), "pixel {x}");
    }
    assert_eq!(canvas.pixel(2, 5), Some(BACKGROUND));

    // entirely off the raster, or too long to even measure
    canvas.draw_line(&NVec2::new(1e30, 1e30), &NVec2::new(2e30, -1e30), WHITE);
    canvas.draw_line(&NVec2::new(-1e308, 0.0), &NVec2::new(1e308, 0.0), WHITE);
    canvas.fill_disc(&NVec2::new(1e30, 0.0), 1e20, WHITE);
    canvas.draw_arrow(&NVec2::zeros(), &NVec2::new(0.0, 1e25), WHITE);
    assert_eq!(canvas.pixel(0, 0), Some(BACKGROUND));
    assert_eq!(canvas.pixel(20, 0), None);
}

// ==================================================================================
// Meniscus tests
// ==================================================================================

fn water() -> MeniscusParams {
    MeniscusParams::from(&MeniscusConfig::default())
}

#[test]
fn capillary_length_of_water() {
    let lc = water().capillary_length();
    assert!((lc - 2.709e-3).abs() < 1e-5, "l_c = {lc}");

    let flat = MeniscusParams { contact_angle_deg: 90.0, ..water() };
    assert!(flat.wall_height().abs() < 1e-12);
    let wet = MeniscusParams { contact_angle_deg: 0.0, ..water() };
    assert!((wet.wall_height() - 2f64.sqrt() * lc).abs() < 1e-12);
    let dry = MeniscusParams { contact_angle_deg: 150.0, ..water() };
    assert!(dry.wall_height() < 0.0);
}

#[test]
fn meniscus_profile_decays_away_from_the_wall() {
    let params = water();
    let h = params.wall_height();
    let profile = params.profile(100);
    assert_eq!(profile.len(), 100);
    assert!(profile[0].x.abs() < 1e-12);
    assert!((profile[0].y - h).abs() < 1e-12);
    for w in profile.windows(2) {
        assert!(w[1].x > w[0].x, "x increases away from the wall");
        assert!(w[1].y < w[0].y, "height decreases away from the wall");
    }

    let dry = MeniscusParams { contact_angle_deg: 120.0, ..water() };
    assert!(dry.profile(20).iter().all(|p| p.y < 0.0));
}

#[test]
fn meniscus_steps_reveal_on_click() {
    let mut app = MeniscusApp::new(&MeniscusConfig { step_interval: 0.0, ..MeniscusConfig::default() });
    assert_eq!(app.steps().len(), 1);
    for _ in 0..20 {
        app.pointer_down(NVec2::zeros());
    }
    assert_eq!(app.steps().len(), DERIVATION_STEPS.len());
    app.update(10.0);
    app.reset();
    assert_eq!(app.revealed, 1);
}

#[test]
fn meniscus_steps_reveal_on_a_steady_clock() {
    let mut app = MeniscusApp::new(&MeniscusConfig { step_interval: 0.75, ..MeniscusConfig::default() });
    for _ in 0..6 {
        app.update(0.5);
    }
    assert_eq!(app.revealed, 1 + 4);
}

// ==================================================================================
// Scenario tests
// ==================================================================================

#[test]
fn scenario_builds_from_yaml() {
    let yaml = r#"
app: kinematics
engine: { integrator: "euler", boundary: "reflect", dt: 0.02, frames: 5 }
fields:
  - preset: "stagnation"
    strength: 0.5
  - u: "0.1*sin(t)"
particles: { count: 12, seed: 9 }
kinematics:
  injectors: [[0.0, 1.0]]
"#;
    let cfg: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
    let field = build_field_set(&cfg.fields).unwrap();
    assert_eq!(field.len(), 2);

    let mut scenario = Scenario::build_scenario(cfg).unwrap();
    assert_eq!(scenario.app.name(), "kinematics");
    assert_eq!(scenario.frames, 5);
    assert_eq!(scenario.parameters.particle_count, 12);

    let mut canvas = Canvas::new(32, 32, scenario.world);
    let mut looping = AnimationLoop::new(scenario.parameters.dt);
    looping.run_headless(&mut *scenario.app, &mut canvas, scenario.frames);
    assert_eq!(looping.frame, 5);
}

#[test]
fn scenario_rejects_bad_config() {
    let cfg: ScenarioConfig = serde_yaml::from_str("app: kinematics\nfields:\n  - strength: 2.0\n").unwrap();
    assert!(matches!(Scenario::build_scenario(cfg), Err(SimError::Config(_))));

    let cfg: ScenarioConfig = serde_yaml::from_str("app: density\ndomain: { x_min: 1.0, x_max: 0.0 }\n").unwrap();
    assert!(matches!(Scenario::build_scenario(cfg), Err(SimError::Config(_))));

    assert!(serde_yaml::from_str::<ScenarioConfig>("app: fluid_dynamics\n").is_err());
}

#[test]
fn every_app_builds_with_defaults() {
    for app in ["kinematics", "deformation", "density", "mean_free_path", "euler_lagrange", "meniscus"] {
        let cfg: ScenarioConfig = serde_yaml::from_str(&format!("app: {app}\n")).unwrap();
        let mut scenario = Scenario::build_scenario(cfg).unwrap();
        assert_eq!(scenario.app.name(), app);
        let mut canvas = Canvas::new(40, 30, scenario.world);
        let mut looping = AnimationLoop::new(scenario.parameters.dt);
        looping.run_headless(&mut *scenario.app, &mut canvas, 3);
        assert!(!scenario.app.status().is_empty());
    }
}
