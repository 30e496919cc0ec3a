//! herald - frame loop demo for the herald message bus.
//!
//! A spinning cube reacts to `ChangeColor` (Update) and `SwitchDirection`
//! (FixedUpdate) messages emitted at random every frame. When the run ends
//! the driver totals, the bus status and the cube state are printed as JSON.

mod cube;

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use herald_core::app::{BusConfig, Driver};
use herald_core::impls::{IntervalTicks, TracingSink, attach_sink};
use herald_core::{Bus, Phase};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cube::{ChangeColor, SpinningCube, SwitchDirection};

#[derive(Parser, Debug)]
#[command(name = "herald", version, about = "Frame loop demo for the herald message bus")]
struct Args {
    /// Number of frames to run
    #[arg(short, long, default_value_t = 120)]
    frames: u64,

    /// Bus configuration (JSON: drain budgets and tick periods)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the random message producer
    #[arg(long)]
    seed: Option<u64>,

    /// Upper bound of messages emitted per frame
    #[arg(long, default_value_t = 3)]
    burst: u32,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(args: &Args) {
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let config = match &args.config {
        Some(path) => BusConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BusConfig::default(),
    };

    let bus = Bus::builder()
        .config(config.clone())
        .declare::<ChangeColor>()
        .declare::<SwitchDirection>()
        .build();
    let _sink = attach_sink(&bus, TracingSink);

    let cube = Rc::new(SpinningCube::default());
    let _wiring = cube::wire(&cube, &bus);

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let burst = args.burst;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    info!(frames = args.frames, seed = ?args.seed, "starting");
    let ticks = IntervalTicks::new(config.ticks.frame_period(), config.ticks.fixed_period())
        .with_frame_limit(args.frames);
    let stats = Driver::new(bus.clone(), ticks)
        .with_hook(move |phase, bus| {
            if phase == Phase::Update {
                cube::emit_random(bus, &mut rng, burst);
            }
        })
        .run(shutdown_rx)
        .await;

    let report = serde_json::json!({
        "driver": stats,
        "bus": bus.status(),
        "cube": cube.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
