use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ninja_motion_runtime::body::{Body, DryRunBody, ServoBody};
use ninja_motion_runtime::config::{DEFAULT_CALIBRATION, SERVO_PORT};
use ninja_motion_runtime::runtime;
use ninja_motion_runtime::servo::ServoBus;
use ninja_motion_runtime::state::{Calibration, Mode, SharedState};

#[derive(Parser, Debug)]
#[command(about = "Motion-command runtime for the WALK/ROLL ninja robot")]
struct Args {
    /// Serial port for the servo bus
    #[arg(long, default_value = SERVO_PORT)]
    port: String,

    /// Calibration JSON file (factory calibration if omitted)
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Run without hardware, logging actuation instead
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    if let Err(e) = start(Args::parse()).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn start(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let calibration = match &args.calibration {
        Some(path) => Calibration::load(path)?,
        None => DEFAULT_CALIBRATION,
    };

    // The robot boots standing, in WALK mode
    let state = SharedState::new(Mode::Walk, calibration);

    if args.dry_run {
        info!("Dry run: no servo hardware will be touched");
        let body = Arc::new(DryRunBody::new(state.clone()));
        runtime::run(state, body).await
    } else {
        let bus = ServoBus::open(&args.port)?;
        let body = Arc::new(ServoBody::new(bus, state.clone()));
        body.initialize()?;
        body.neutral_stance()?;
        runtime::run(state, body).await
    }
}
