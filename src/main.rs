use cmviz::{load_scenario, AnimationLoop, Canvas, Scenario, ScenarioConfig};
use cmviz::{bench_advection, bench_advection_curve, bench_symbolic};
#[cfg(feature = "viewer")]
use cmviz::{run_2d, run_3d, AppKind, DeformationScene};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;

#[derive(Parser, Debug)]
struct Args {
    /// Scenario file; bare names are looked up under `scenarios/`
    #[arg(short, default_value = "kinematics.yaml")]
    file_name: String,

    /// Run the frame loop without a window
    #[arg(long)]
    headless: bool,

    /// Frames to run headless (overrides the scenario)
    #[arg(long)]
    frames: Option<u64>,

    /// Print advection and symbolic timings and exit
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let given = PathBuf::from(file_name);
    let config_path = if given.components().count() > 1 || given.exists() {
        given
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name)
    };
    load_scenario(&config_path).with_context(|| format!("failed to load scenario {}", config_path.display()))
}

fn run_headless(scenario: Scenario, frames: Option<u64>) {
    let Scenario { mut app, world, canvas, parameters, frames: cfg_frames, .. } = scenario;
    let mut raster = Canvas::new(canvas.width.max(1), canvas.height.max(1), world);
    let mut looping = AnimationLoop::new(parameters.dt);
    let frames = frames.unwrap_or(cfg_frames);

    looping.run_headless(&mut *app, &mut raster, frames);
    info!(frames, t = looping.time, "{}: {}", app.name(), app.status());
}

#[cfg(feature = "viewer")]
fn run_windowed(scenario_cfg: ScenarioConfig, _frames: Option<u64>) -> Result<()> {
    if scenario_cfg.app == AppKind::Deformation {
        run_3d(DeformationScene::build_scene(&scenario_cfg.deformation));
    } else {
        run_2d(Scenario::build_scenario(scenario_cfg)?);
    }
    Ok(())
}

#[cfg(not(feature = "viewer"))]
fn run_windowed(scenario_cfg: ScenarioConfig, frames: Option<u64>) -> Result<()> {
    info!("built without the `viewer` feature; running headless");
    run_headless(Scenario::build_scenario(scenario_cfg)?, frames);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.bench {
        bench_advection();
        bench_advection_curve();
        bench_symbolic();
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;

    if args.headless {
        run_headless(Scenario::build_scenario(scenario_cfg)?, args.frames);
    } else {
        run_windowed(scenario_cfg, args.frames)?;
    }

    Ok(())
}
