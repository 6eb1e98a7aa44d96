//! Gateway: owns the venue market-data connection and the execution backend
//! chosen by configuration.
//!
//! Grounded on the original `gateway.py`'s `Gateway`/`LiveExecution` pair: a
//! thin factory that picks paper vs. live execution from config and exposes
//! subscribe/snapshot primitives. Market-data transport (the venue SDK's
//! websocket framing, REST signing) is out of scope for this crate — callers
//! supply a [`MarketDataClient`] implementation and the gateway only wires it
//! to the book store, L4 maintainer, and order manager callbacks.

use crate::book::BookStore;
use crate::config::Config;
use crate::core::errors::GatewayError;
use crate::core::{AccountState, Fill, L2BookSnapshot, Order, Symbol};
use crate::execution::{live::LiveExecutor, paper::PaperExecutor, ExecutionBackend};
use crate::order_manager::OrderUpdateEvent;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Subscription-id handle returned by the market-data client. Opaque to the
/// gateway; callers use it only to unsubscribe, which this engine never
/// needs to do mid-run.
pub type SubscriptionId = u64;

/// What the gateway needs from the venue's market-data transport.
///
/// A real implementation wraps the signed REST client and the websocket
/// reader thread; this crate only depends on the shape below. Tests exercise
/// the gateway against a fake implementation.
pub trait MarketDataClient: Send + Sync {
    fn subscribe_l2(&self, symbol: &Symbol, callback: Box<dyn Fn(L2BookSnapshot) + Send>) -> Result<SubscriptionId>;
    fn subscribe_trades(&self, symbol: &Symbol, callback: Box<dyn Fn(serde_json::Value) + Send>) -> Result<SubscriptionId>;
    fn subscribe_user_fills(&self, address: &str, callback: Box<dyn Fn(Fill) + Send>) -> Result<SubscriptionId>;
    fn subscribe_order_updates(&self, address: &str, callback: Box<dyn Fn(Vec<OrderUpdateEvent>) + Send>) -> Result<SubscriptionId>;
    fn subscribe_bbo(&self, symbol: &Symbol, callback: Box<dyn Fn(L2BookSnapshot) + Send>) -> Result<SubscriptionId>;

    fn get_l2_snapshot(&self, symbol: &Symbol) -> Result<L2BookSnapshot>;
    fn get_all_mids(&self) -> Result<std::collections::HashMap<Symbol, rust_decimal::Decimal>>;
    fn get_meta(&self) -> Result<serde_json::Value>;

    /// Stop the websocket manager. Idempotent.
    fn shutdown(&self);
}

/// Unified interface for market data and execution, owned by the engine for
/// the lifetime of the process.
pub struct Gateway {
    market_data: Arc<dyn MarketDataClient>,
    execution: Arc<dyn ExecutionBackend>,
}

impl Gateway {
    /// Build a gateway directly from its two halves. Used by tests and by
    /// [`Gateway::create`] once it has picked an execution backend.
    pub fn new(market_data: Arc<dyn MarketDataClient>, execution: Arc<dyn ExecutionBackend>) -> Self {
        Self { market_data, execution }
    }

    /// Factory: build the right execution backend based on config.
    ///
    /// Paper mode wraps a fresh [`PaperExecutor`] around `books` (so it
    /// simulates against whatever the market-data client populates); live
    /// mode requires wallet credentials and delegates to `live_client`.
    pub fn create(
        config: &Config,
        market_data: Arc<dyn MarketDataClient>,
        books: Arc<BookStore>,
        live_client: Option<Box<dyn crate::execution::live::VenueClient>>,
    ) -> Result<Self> {
        let execution: Arc<dyn ExecutionBackend> = if config.paper_mode {
            info!("gateway: paper execution backend selected");
            Arc::new(PaperExecutor::new(books))
        } else {
            let has_wallet = config.wallet.secret_key.is_some() && config.wallet.account_address.is_some();
            LiveExecutor::require_credentials(has_wallet)
                .map_err(|_| GatewayError::NoWalletCredentials)?;
            let client = live_client.ok_or(GatewayError::NoWalletCredentials)?;
            info!("gateway: live execution backend selected");
            Arc::new(LiveExecutor::new(client)?)
        };

        Ok(Self::new(market_data, execution))
    }

    pub fn execution(&self) -> &Arc<dyn ExecutionBackend> {
        &self.execution
    }

    pub fn subscribe_l2(&self, symbol: &Symbol, callback: Box<dyn Fn(L2BookSnapshot) + Send>) -> Result<SubscriptionId> {
        self.market_data.subscribe_l2(symbol, callback)
    }

    pub fn subscribe_trades(&self, symbol: &Symbol, callback: Box<dyn Fn(serde_json::Value) + Send>) -> Result<SubscriptionId> {
        self.market_data.subscribe_trades(symbol, callback)
    }

    pub fn subscribe_user_fills(&self, address: &str, callback: Box<dyn Fn(Fill) + Send>) -> Result<SubscriptionId> {
        self.market_data.subscribe_user_fills(address, callback)
    }

    pub fn subscribe_order_updates(
        &self,
        address: &str,
        callback: Box<dyn Fn(Vec<OrderUpdateEvent>) + Send>,
    ) -> Result<SubscriptionId> {
        self.market_data.subscribe_order_updates(address, callback)
    }

    pub fn subscribe_bbo(&self, symbol: &Symbol, callback: Box<dyn Fn(L2BookSnapshot) + Send>) -> Result<SubscriptionId> {
        self.market_data.subscribe_bbo(symbol, callback)
    }

    pub fn get_l2_snapshot(&self, symbol: &Symbol) -> Result<L2BookSnapshot> {
        self.market_data.get_l2_snapshot(symbol)
    }

    pub fn get_all_mids(&self) -> Result<std::collections::HashMap<Symbol, rust_decimal::Decimal>> {
        self.market_data.get_all_mids()
    }

    pub fn get_meta(&self) -> Result<serde_json::Value> {
        self.market_data.get_meta()
    }

    /// Best-effort account snapshot; callers substitute a zero state on error.
    pub fn get_user_state(&self) -> Result<AccountState> {
        self.execution.get_user_state()
    }

    pub fn get_open_orders(&self, symbol: Option<&Symbol>) -> Result<Vec<Order>> {
        self.execution.get_open_orders(symbol)
    }

    pub fn shutdown(&self) {
        self.market_data.shutdown();
    }
}
