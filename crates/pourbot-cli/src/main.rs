//! `pourbot` – dispenser node entry point
//!
//! One binary, two roles:
//!
//! - `pourbot sense` – the camera node: dials the control node, acquires
//!   depth scans, reports centering status, and sends volume estimates.
//! - `pourbot control` – the actuator node: listens for the sensing peer,
//!   polls the order file, drives the gantry and valves through a pour
//!   cycle.
//!
//! Both roles read `~/.pourbot/config.toml` (with `POURBOT_*` environment
//! overrides) and run until Ctrl-C or a hardware/link fault.

mod config;

use pourbot_hal::depth::DepthFrame;
use pourbot_hal::sim::{SimActuatorBus, SimDepthCamera};
use pourbot_perception::centering::CenteringEvaluator;
use pourbot_perception::scan::{ScanSource, ScanSourceConfig};
use pourbot_perception::volume::VolumeEstimator;
use pourbot_protocol::link::{ConnectRetry, StreamLink};
use pourbot_runtime::{ControlConfig, ControlSession, FileRecipeSource, SensingSession};
use pourbot_types::DispenserError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // Initialise tracing-subscriber using RUST_LOG (defaults to "info").
    // Set POURBOT_LOG_FORMAT=json to emit newline-delimited JSON logs
    // suitable for log aggregators.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("POURBOT_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            info!(path = %config::config_path().display(), "config loaded");
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            // Persist the defaults so operators have a file to edit.
            match config::save(&cfg) {
                Ok(()) => {
                    info!(path = %config::config_path().display(), "wrote default config")
                }
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            warn!(error = %e, "config unreadable; using defaults");
            config::Config::default()
        }
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    // Both state machines park in blocking receives with no cancellation
    // point, so shutdown is a hard process exit. Valves are only open inside
    // a pour sleep; the reset on the next power-up homes the gantry.
    if let Err(e) = ctrlc::set_handler(|| {
        warn!("Ctrl-C received; shutting down");
        std::process::exit(0);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    // ── Role dispatch ─────────────────────────────────────────────────────
    let role = std::env::args().nth(1).unwrap_or_default();
    let result = match role.as_str() {
        "sense" => run_sensing(&cfg).await,
        "control" => run_control(&cfg).await,
        _ => {
            print_usage();
            return;
        }
    };

    if let Err(e) = result {
        error!(error = %e, role, "node terminated on fault");
        std::process::exit(1);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

async fn run_sensing(cfg: &config::Config) -> Result<(), DispenserError> {
    info!(control_addr = %cfg.control_addr, "sensing node starting");
    let link = StreamLink::connect(cfg.control_addr.as_str(), ConnectRetry::default()).await?;

    let scan_cfg = ScanSourceConfig {
        max_range_m: cfg.max_range_m,
        ..ScanSourceConfig::default()
    };
    let mut session = SensingSession::new(
        ScanSource::with_config(demo_camera(), scan_cfg),
        CenteringEvaluator::default(),
        VolumeEstimator::default(),
        link,
    );
    session.run().await
}

async fn run_control(cfg: &config::Config) -> Result<(), DispenserError> {
    info!(listen_addr = %cfg.listen_addr, recipe_path = %cfg.recipe_path, "control node starting");
    let link = StreamLink::accept(cfg.listen_addr.as_str()).await?;

    let control_cfg = ControlConfig {
        flow_rates_oz_per_s: cfg.flow_rates_oz_per_s,
        ..ControlConfig::default()
    };
    let mut session = ControlSession::new(
        SimActuatorBus::new("i2c0"),
        link,
        FileRecipeSource::new(&cfg.recipe_path),
        control_cfg,
    );
    session.run().await
}

/// Scripted depth camera for headless bring-up: an empty tray, an off-center
/// cup, then a centered cup that stays in place (the last frame repeats).
fn demo_camera() -> SimDepthCamera {
    SimDepthCamera::new("tof0")
        .with_frame(demo_frame(&[]))
        .with_frame(demo_frame(&[60, 100]))
        .with_frame(demo_frame(&[100, 140]))
}

fn demo_frame(rims: &[usize]) -> DepthFrame {
    let mut scan = vec![0.40; 240];
    if let [a, b] = *rims {
        for v in &mut scan[a + 1..b] {
            *v = 0.35;
        }
        scan[a] = 0.25;
        scan[b] = 0.25;
    }
    DepthFrame {
        width: scan.len(),
        height: 1,
        data: scan,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner / usage
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!(r#"   ___                ___       __ "#);
    println!(r#"  / _ \___  __ ______/ _ )___  / /_"#);
    println!(r#" / ___/ _ \/ // / __/ _  / _ \/ __/"#);
    println!(r#"/_/   \___/\_,_/_/ /____/\___/\__/ "#);
    println!();
    println!("  PourBot v{}", env!("CARGO_PKG_VERSION"));
    println!("  Automated Beverage Dispenser");
    println!();
}

fn print_usage() {
    println!("Usage: pourbot <role>");
    println!();
    println!("Roles:");
    println!("  sense     camera node: centering + volume estimation");
    println!("  control   actuator node: orders, gantry, and valves");
    println!();
    println!("Config: ~/.pourbot/config.toml (POURBOT_* env vars override)");
}
