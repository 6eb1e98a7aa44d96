//! Core engine library for a perpetual-futures market-making reconciliation
//! process.
//!
//! Everything on the accounting path is a [`rust_decimal::Decimal`]; floats
//! only appear at the venue-API boundary, behind the transport traits this
//! crate defines but does not implement ([`gateway::MarketDataClient`],
//! [`execution::live::VenueClient`], [`l4::L4Transport`]). The process is a
//! single tick-driven reconciliation loop plus a handful of reader/ping
//! threads — no async runtime.
//!
//! ## Modules
//! - [`core`]: domain types (orders, fills, positions, books) and error enums
//! - [`config`]: JSON configuration, validated at load time
//! - [`book`]: last-write-wins L2 book store, shared across threads
//! - [`l4`]: order-by-order (L4) book maintainer and its websocket client
//! - [`execution`]: the paper/live execution backend seam
//! - [`order_manager`]: client-id/venue-id order correlation
//! - [`gateway`]: wires market data and execution together for the engine
//! - [`recorder`]: optional JSONL/CSV recording of observed market data
//! - [`strategy`]: the strategy trait strategies implement
//! - [`engine`]: the tick-loop orchestrator
//! - [`monitoring`]: Prometheus metrics and their scrape endpoint
//! - [`utils`]: logging setup

pub mod book;
pub mod config;
pub mod core;
pub mod engine;
pub mod execution;
pub mod gateway;
pub mod l4;
pub mod monitoring;
pub mod order_manager;
pub mod recorder;
pub mod strategy;
pub mod utils;

pub use book::BookStore;
pub use config::Config;
pub use core::{
    AccountState, DesiredOrder, Fill, L2BookSnapshot, L4BookSnapshot, L4Order, Order, OrderStatus,
    OrderType, Position, PriceLevel, Side, StrategyDecision, Symbol, TimeInForce,
};
pub use engine::{Engine, EngineStats};
pub use execution::{ExecutionBackend, PlaceOrderRequest, PlacementAck, PlacementStatus};
pub use gateway::{Gateway, MarketDataClient};
pub use l4::{L4Client, L4ClientHandle, L4Maintainer, L4Transport};
pub use monitoring::MetricsRegistry;
pub use order_manager::{OrderManager, OrderUpdateEvent};
pub use recorder::DataRecorder;
pub use strategy::Strategy;

pub use anyhow::{Error, Result};

/// Re-exports grouped for strategy crates that only need the decision-facing
/// surface, not the engine or gateway plumbing.
pub mod prelude {
    pub use crate::core::{
        AccountState, DesiredOrder, Fill, L2BookSnapshot, Order, OrderType, Side, StrategyDecision,
        Symbol, TimeInForce,
    };
    pub use crate::strategy::Strategy;
    pub use crate::{Error, Result};
}
