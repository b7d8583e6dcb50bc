//! Severe-weather index overlay worker.
//!
//! One run end to end: resolve the newest published GFS cycle, fetch
//! the regional variable subset, derive the index field, render the
//! indexed-PNG overlay, and atomically publish it with its placement
//! metadata. Exits 0 on success or when no cycle is published yet,
//! non-zero on any fatal error.

mod config;
mod cycle;
mod fetch;
mod pipeline;
mod publish;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use swi_common::BoundingBox;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::OverlayConfig;
use pipeline::RunOutcome;

#[derive(Parser, Debug)]
#[command(name = "swi-worker")]
#[command(about = "Severe-weather index overlay generator")]
struct Args {
    /// Overlay configuration file (YAML); compiled-in defaults apply
    /// when omitted
    #[arg(short, long, env = "SWI_CONFIG")]
    config: Option<PathBuf>,

    /// Bounding box override, "west,east,south,north" in degrees
    #[arg(long)]
    bbox: Option<String>,

    /// Log level
    #[arg(long, env = "SWI_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => OverlayConfig::load(path)?,
        None => OverlayConfig::default(),
    };

    if let Some(bbox) = &args.bbox {
        config.region.bbox =
            BoundingBox::from_arg_string(bbox).context("Invalid --bbox argument")?;
        config.validate()?;
    }

    info!(
        strategy = ?config.index.strategy,
        west = config.region.bbox.west,
        east = config.region.bbox.east,
        south = config.region.bbox.south,
        north = config.region.bbox.north,
        "Starting overlay run"
    );

    match pipeline::run(&config, Utc::now()).await? {
        RunOutcome::Published { cycle } => {
            info!(cycle = %cycle.iso8601(), "Overlay published");
        }
        RunOutcome::NoCycleAvailable => {
            info!("No published cycle available; previous artifacts left in place");
        }
    }

    Ok(())
}
