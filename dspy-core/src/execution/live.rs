//! Live execution backend: delegates to the venue over whatever transport
//! `VenueClient` wraps.
//!
//! Venue wire plumbing (HTTP signing, websocket framing) is out of scope here;
//! this module only defines the seam the engine and gateway wire up to a real
//! client at startup, grounded on the original `gateway.py`'s `LiveExecution`
//! class, which is itself a thin pass-through to the exchange SDK.

use super::{ExecutionBackend, PlaceOrderRequest, PlacementAck, PlacementStatus};
use crate::core::errors::GatewayError;
use crate::core::{AccountState, Fill, Order, Symbol};
use anyhow::{Context, Result};

/// What a live backend needs from the venue transport. A real implementation
/// wraps the signed REST/websocket client; tests and the paper path never
/// need one.
pub trait VenueClient: Send + Sync {
    fn place_order(&self, symbol: &Symbol, request: &PlaceOrderRequest) -> Result<PlacementAck>;
    fn place_bulk_orders(&self, symbol: &Symbol, requests: &[PlaceOrderRequest]) -> Result<PlacementAck>;
    fn cancel_order(&self, symbol: &Symbol, venue_order_id: u64) -> Result<PlacementAck>;
    fn cancel_bulk(&self, symbol: &Symbol, venue_order_ids: &[u64]) -> Result<PlacementAck>;
    fn cancel_all(&self, symbol: &Symbol) -> Result<()>;
    fn get_open_orders(&self, symbol: Option<&Symbol>) -> Result<Vec<Order>>;
    fn get_user_state(&self) -> Result<AccountState>;
    fn get_user_fills(&self) -> Result<Vec<Fill>>;
}

/// Execution backend that forwards every call to a [`VenueClient`], turning
/// transport errors into an `Error` status rather than propagating a panic
/// or a bare `Result` up through the order manager.
pub struct LiveExecutor {
    client: Box<dyn VenueClient>,
}

impl LiveExecutor {
    /// Fails fast if the venue client can't be constructed for lack of wallet
    /// credentials, per the spec's "no silent demotion to paper mode" rule.
    pub fn new(client: Box<dyn VenueClient>) -> Result<Self> {
        Ok(Self { client })
    }

    pub fn require_credentials(has_wallet: bool) -> Result<()> {
        if !has_wallet {
            return Err(GatewayError::NoWalletCredentials).context("live mode requires wallet credentials");
        }
        Ok(())
    }
}

impl ExecutionBackend for LiveExecutor {
    fn place_order(&self, symbol: &Symbol, request: &PlaceOrderRequest) -> PlacementAck {
        self.client
            .place_order(symbol, request)
            .unwrap_or_else(|e| PlacementAck::error(e.to_string()))
    }

    fn place_bulk_orders(&self, symbol: &Symbol, requests: &[PlaceOrderRequest]) -> PlacementAck {
        self.client
            .place_bulk_orders(symbol, requests)
            .unwrap_or_else(|e| PlacementAck::error(e.to_string()))
    }

    fn cancel_order(&self, symbol: &Symbol, venue_order_id: u64) -> PlacementAck {
        self.client
            .cancel_order(symbol, venue_order_id)
            .unwrap_or_else(|e| PlacementAck::error(e.to_string()))
    }

    fn cancel_bulk(&self, symbol: &Symbol, venue_order_ids: &[u64]) -> PlacementAck {
        self.client
            .cancel_bulk(symbol, venue_order_ids)
            .unwrap_or_else(|e| PlacementAck::error(e.to_string()))
    }

    fn cancel_all(&self, symbol: &Symbol) -> Result<()> {
        self.client.cancel_all(symbol)
    }

    fn get_open_orders(&self, symbol: Option<&Symbol>) -> Result<Vec<Order>> {
        self.client.get_open_orders(symbol)
    }

    fn get_user_state(&self) -> Result<AccountState> {
        self.client.get_user_state()
    }

    fn get_user_fills(&self) -> Result<Vec<Fill>> {
        self.client.get_user_fills()
    }
}
