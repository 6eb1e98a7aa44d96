//! `dspy-engine`: loads configuration, wires a reference strategy to a
//! gateway, and runs the tick loop until SIGINT/SIGTERM.
//!
//! Parses CLI args, inits logging, builds the engine's collaborators, runs,
//! reports final stats. This binary never drives a real venue connection —
//! `dspy-core` treats venue transport as out of scope, so paper mode runs
//! against the synthetic feed in `dspy_bins::synthetic_feed` instead of a
//! production market-data source.

use anyhow::{bail, Result};
use clap::Parser;
use dspy_bins::common::{init_logging, print_stats, CommonArgs};
use dspy_bins::synthetic_feed::SyntheticMarketData;
use dspy_core::{BookStore, Config, Engine, Gateway, MetricsRegistry};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

fn main() -> Result<()> {
    let args = CommonArgs::parse();

    let mut config = Config::load(&args.config)?;
    if args.paper {
        config.paper_mode = true;
    }
    init_logging(&config.log_level, args.json_logs);

    info!(paper_mode = config.paper_mode, coins = ?config.trading.coins, "configuration loaded");

    if !config.paper_mode {
        bail!("dspy-engine only drives the synthetic feed; run with --paper or set paper_mode in config");
    }

    let books = Arc::new(BookStore::new());
    let market_data = Arc::new(SyntheticMarketData::new(dec!(50_000), dec!(5), Duration::from_millis(250)));
    let gateway = Arc::new(Gateway::create(&config, market_data, Arc::clone(&books), None)?);

    if config.l4_server_url.is_some() {
        warn!("l4_server_url is configured but dspy-engine has no L4 transport wired up; L4 recording is disabled for this run");
    }

    let recorder = if config.recording.enabled {
        info!(output_dir = %config.recording.output_dir, "recording enabled");
        Some(dspy_core::DataRecorder::new(config.recording.clone()))
    } else {
        None
    };

    let metrics = match &args.metrics_addr {
        Some(addr) => {
            let registry = Arc::new(MetricsRegistry::new()?);
            dspy_core::monitoring::spawn_metrics_server(addr, Arc::clone(&registry))?;
            Some(registry)
        }
        None => None,
    };

    let strategy = args.strategy.build();
    info!(strategy = ?args.strategy, "strategy selected");

    let engine = Engine::new(config, gateway, books, strategy, None, recorder, metrics);

    info!("starting engine, press Ctrl+C to stop");
    engine.run();

    print_stats(&engine.stats());
    Ok(())
}
