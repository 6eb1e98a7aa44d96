//! Execution backend: places, cancels, and queries orders.
//!
//! One trait, two implementations — [`paper::PaperExecutor`] simulates against
//! the observed public book, [`live::LiveExecutor`] delegates to the venue. The
//! order manager interprets nothing from a backend but the [`PlacementAck`]
//! shape below; strategies never see a backend at all.

pub mod live;
pub mod paper;
pub mod types;

pub use types::{PlaceOrderRequest, PlacementAck, PlacementStatus};

use crate::core::{AccountState, Fill, Order, Symbol};
use anyhow::Result;

/// Abstraction over order execution backends.
///
/// Implementations must honor the [`PlacementAck`] contract exactly: the order
/// manager never inspects anything else when deciding how to update its
/// tracking map.
pub trait ExecutionBackend: Send + Sync {
    fn place_order(&self, symbol: &Symbol, request: &PlaceOrderRequest) -> PlacementAck;

    fn place_bulk_orders(&self, symbol: &Symbol, requests: &[PlaceOrderRequest]) -> PlacementAck;

    fn cancel_order(&self, symbol: &Symbol, venue_order_id: u64) -> PlacementAck;

    fn cancel_bulk(&self, symbol: &Symbol, venue_order_ids: &[u64]) -> PlacementAck;

    fn cancel_all(&self, symbol: &Symbol) -> Result<()>;

    fn get_open_orders(&self, symbol: Option<&Symbol>) -> Result<Vec<Order>>;

    fn get_user_state(&self) -> Result<AccountState>;

    fn get_user_fills(&self) -> Result<Vec<Fill>>;

    /// Match any internally-simulated resting orders against the current
    /// market and return whatever fills result. Only [`paper::PaperExecutor`]
    /// does anything here; the live backend's fills arrive over the venue's
    /// own user-fills websocket instead, so the default is a no-op.
    fn check_resting_orders(&self, _now_ms: i64) -> Vec<Fill> {
        Vec::new()
    }
}
