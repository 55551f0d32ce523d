#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Scheduler daemon entry point.
//!
//! Runs the recurring brief batches against the production
//! collaborators (Nominatim geocoding, the Socrata feed). Until a chat
//! transport is wired up, deliveries go to the log sink.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use crime_brief_engine::{Engine, EngineConfig};
use crime_brief_scheduler::{LogSink, Scheduler};

#[derive(Parser)]
#[command(name = "crime_brief_scheduler")]
#[command(about = "Runs recurring crime brief generation for subscribers")]
struct Args {
    /// Path to a TOML configuration file (compiled-in defaults
    /// otherwise).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run one batch immediately and exit instead of running the
    /// daemon loop.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("failed to load config {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    let engine = Arc::new(Engine::with_defaults(config));
    let scheduler = Scheduler::new(engine, Arc::new(LogSink));

    if args.once {
        let summary = scheduler.run_once().await;
        log::info!(
            "batch finished: {}/{} delivered, {} failed",
            summary.delivered,
            summary.attempted,
            summary.failed
        );
    } else {
        log::info!("crime brief scheduler starting");
        scheduler.run_forever().await;
    }
}
