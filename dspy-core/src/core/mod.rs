//! Core domain types for the reconciliation engine.
//!
//! Everything on the accounting path — prices, sizes, PnL, balances — is a
//! [`rust_decimal::Decimal`]. Floating point only appears at the venue-API
//! boundary, where the venue itself demands it.

pub mod errors;
pub mod types;

pub use errors::{ConfigError, GatewayError, PaperExecutionError};
pub use types::{
    AccountState, DesiredOrder, Fill, L2BookSnapshot, L4BookSnapshot, L4Order, Order, OrderStatus,
    OrderType, Position, PriceLevel, Side, StrategyDecision, Symbol, TimeInForce,
};
