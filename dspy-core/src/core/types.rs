//! Domain model: symbols, book snapshots, orders, fills, positions, account state.
//!
//! All scalars on the accounting path are [`Decimal`]; timestamps are millisecond
//! epoch integers, matching the `int(time.time() * 1000)` convention of the venue
//! this engine was originally built against.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque venue-recognized ticker, e.g. `"BTC"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Order side. Also used to describe which side of the book a resting order
/// or L4 entry sits on (`Buy` rests among bids, `Sell` rests among asks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The sign convention used by position arithmetic: `+1` for buys, `-1` for sells.
    pub fn sign(self) -> i32 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type understood by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

/// Time-in-force. Only the two values actually used by this venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-till-cancelled: rests on the book until filled or cancelled.
    Gtc,
    /// Immediate-or-cancel: fills what it can against the current book, or dies.
    Ioc,
}

/// A single price level in an L2 snapshot. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
    pub order_count: u32,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal, order_count: u32) -> Self {
        Self {
            price,
            size,
            order_count,
        }
    }
}

/// Price-level-aggregated order book snapshot for one symbol.
///
/// `bids` is sorted by price descending, `asks` by price ascending — the book
/// store never re-sorts what the venue sends, it only stores the latest one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L2BookSnapshot {
    pub symbol: Symbol,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub timestamp_ms: i64,
}

impl L2BookSnapshot {
    pub fn new(symbol: Symbol, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>, timestamp_ms: i64) -> Self {
        Self {
            symbol,
            bids,
            asks,
            timestamp_ms,
        }
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// `(best_bid + best_ask) / 2`, undefined unless both sides are non-empty.
    pub fn mid(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some((bid + ask) / Decimal::TWO)
    }

    /// `best_ask - best_bid`, undefined unless both sides are non-empty.
    pub fn spread(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some(ask - bid)
    }

    /// `spread / mid * 10_000`, undefined unless `mid > 0`.
    pub fn spread_bps(&self) -> Option<Decimal> {
        let mid = self.mid()?;
        if mid <= Decimal::ZERO {
            return None;
        }
        let spread = self.spread()?;
        Some(spread / mid * Decimal::from(10_000))
    }
}

/// A single resting order as reported by an L4 (order-by-order) feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct L4Order {
    pub venue_order_id: u64,
    pub owner: String,
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
}

/// Order-by-order book snapshot: price -> the set of individual orders resting there.
///
/// Populated by folding one snapshot message and a sequence of diffs; see
/// `l4::L4Maintainer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L4BookSnapshot {
    pub symbol: Symbol,
    pub bids: std::collections::BTreeMap<Decimal, Vec<L4Order>>,
    pub asks: std::collections::BTreeMap<Decimal, Vec<L4Order>>,
    pub timestamp_ms: i64,
}

impl L4BookSnapshot {
    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: Default::default(),
            asks: Default::default(),
            timestamp_ms: 0,
        }
    }

    /// Highest bid price with at least one resting order, if any.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    /// Lowest ask price with at least one resting order, if any.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    pub fn total_bid_size(&self) -> Decimal {
        self.bids
            .values()
            .flatten()
            .fold(Decimal::ZERO, |acc, o| acc + o.size)
    }

    pub fn total_ask_size(&self) -> Decimal {
        self.asks
            .values()
            .flatten()
            .fold(Decimal::ZERO, |acc, o| acc + o.size)
    }
}

/// Order status. Transitions follow a directed graph with three terminal states.
///
/// ```text
/// Pending -> Open | Filled | Rejected
/// Open    -> PartiallyFilled | Filled | Cancelled | Rejected
/// PartiallyFilled -> Filled | Cancelled
/// (terminal: Filled, Cancelled, Rejected)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Open => "Open",
            OrderStatus::PartiallyFilled => "PartiallyFilled",
            OrderStatus::Filled => "Filled",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Rejected => "Rejected",
        };
        write!(f, "{s}")
    }
}

/// An order tracked by this process, from placement through a terminal state.
///
/// Invariants upheld by the order manager, not by this type alone:
/// - `0 <= filled_size <= size`
/// - once `status` is terminal, no field but `updated_at_ms` changes again
/// - `venue_order_id`, once set, is never reassigned
/// - `client_id` is unique for the lifetime of the process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub client_id: u64,
    pub venue_order_id: Option<u64>,
    pub symbol: Symbol,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub status: OrderStatus,
    pub filled_size: Decimal,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Order {
    pub fn remaining_size(&self) -> Decimal {
        self.size - self.filled_size
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// An executed trade against one of our orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub symbol: Symbol,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub venue_order_id: u64,
    pub fee: Decimal,
    pub timestamp_ms: i64,
    pub closed_pnl: Decimal,
    pub crossed: bool,
}

/// A symbol's open position. Positive `size` is long, negative is short.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub leverage: u32,
    pub liquidation_price: Option<Decimal>,
    pub margin_used: Decimal,
}

/// Point-in-time account snapshot. Never shared mutably; callers get an owned copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    pub account_value: Decimal,
    pub total_margin_used: Decimal,
    pub withdrawable: Decimal,
    pub positions: std::collections::HashMap<Symbol, Position>,
}

impl AccountState {
    /// A best-effort fallback used when the venue's account endpoint is unreachable.
    pub fn zero() -> Self {
        Self {
            account_value: Decimal::ZERO,
            total_margin_used: Decimal::ZERO,
            withdrawable: Decimal::ZERO,
            positions: Default::default(),
        }
    }
}

/// A request to place one order, as produced by a strategy. Not yet an [`Order`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredOrder {
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub order_type: OrderType,
    pub reduce_only: bool,
}

impl DesiredOrder {
    pub fn new(side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            side,
            price,
            size,
            order_type: OrderType::Limit,
            reduce_only: false,
        }
    }
}

/// What a strategy wants to happen to one symbol's resting orders this tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub symbol: Symbol,
    pub desired_orders: Vec<DesiredOrder>,
    pub cancel_all_first: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(bid: Decimal, ask: Decimal) -> L2BookSnapshot {
        L2BookSnapshot::new(
            Symbol::from("BTC"),
            vec![PriceLevel::new(bid, dec!(1.5), 1)],
            vec![PriceLevel::new(ask, dec!(1.2), 1)],
            0,
        )
    }

    #[test]
    fn l2_mid_spread_computation() {
        let book = snapshot(dec!(67500.0), dec!(67510.0));
        assert_eq!(book.mid(), Some(dec!(67505.0)));
        assert_eq!(book.spread(), Some(dec!(10.0)));
        let bps = book.spread_bps().unwrap();
        assert!((bps - dec!(1.481)).abs() < dec!(0.001));
    }

    #[test]
    fn empty_book_derived_fields_are_undefined() {
        let book = L2BookSnapshot::new(Symbol::from("BTC"), vec![], vec![], 0);
        assert_eq!(book.mid(), None);
        assert_eq!(book.spread(), None);
        assert_eq!(book.spread_bps(), None);
    }

    #[test]
    fn order_status_terminal_classification() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Open.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
    }

    #[test]
    fn l4_best_bid_ask_from_price_map() {
        let mut snap = L4BookSnapshot::empty(Symbol::from("BTC"));
        snap.bids.insert(
            dec!(67500),
            vec![L4Order {
                venue_order_id: 1,
                owner: "0xabc".into(),
                price: dec!(67500),
                size: dec!(1),
                side: Side::Buy,
            }],
        );
        assert_eq!(snap.best_bid(), Some(dec!(67500)));
        assert_eq!(snap.best_ask(), None);
    }
}
