//! Common CLI plumbing for the `dspy-engine` binary.
//!
//! Grounded on `bog-bins::common`: a shared `CommonArgs` struct plus
//! logging init and final-stats reporting, reused instead of duplicated
//! across binaries.

use clap::{Parser, ValueEnum};
use dspy_core::EngineStats;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use tracing::info;

/// CLI arguments shared by every entry point into the engine.
#[derive(Parser, Debug)]
#[command(author, version, about = "Tick-driven reconciliation market maker")]
pub struct CommonArgs {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Which reference strategy to run.
    #[arg(short, long, value_enum, default_value = "simple-spread")]
    pub strategy: StrategyChoice,

    /// Force paper mode regardless of `config.paper_mode`. Never forces live mode.
    #[arg(long)]
    pub paper: bool,

    /// Emit structured JSON logs instead of plain text.
    #[arg(long)]
    pub json_logs: bool,

    /// Bind address for the Prometheus scrape endpoint, e.g. `127.0.0.1:9090`.
    /// Metrics are disabled when omitted.
    #[arg(long)]
    pub metrics_addr: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StrategyChoice {
    SimpleSpread,
    InventoryBased,
}

impl StrategyChoice {
    pub fn build(self) -> Box<dyn dspy_core::Strategy> {
        match self {
            StrategyChoice::SimpleSpread => {
                Box::new(dspy_strategies::SimpleSpreadStrategy::new(dec!(10), dec!(0.001), dec!(5)))
            }
            StrategyChoice::InventoryBased => Box::new(dspy_strategies::InventoryBasedStrategy::new(
                dec!(10),
                dec!(0.001),
                dec!(20),
                dec!(1),
                dec!(2),
            )),
        }
    }
}

/// Initialize tracing, seeded from the config's `log_level` unless `RUST_LOG` is set.
pub fn init_logging(log_level: &str, json_logs: bool) {
    dspy_core::utils::init_logger(log_level, json_logs);
}

/// Log final engine counters on shutdown.
pub fn print_stats(stats: &EngineStats) {
    info!("=== Final Statistics ===");
    info!("Ticks completed: {}", stats.ticks_completed);
    info!("Tick errors: {}", stats.tick_errors);
    info!("Fills processed: {}", stats.fills_processed);
}
