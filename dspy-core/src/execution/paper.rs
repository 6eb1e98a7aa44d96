//! Paper execution backend: simulates order placement and matching against
//! the live public book, so strategies run identically in paper and live mode.
//!
//! Grounded on the original Python `paper.py`: a single lock guards the next
//! venue id counter, the open-order map, the fill log, positions, and cash
//! balance; leverage is fixed at 20 for margin reporting; there is no funding,
//! no liquidation, and no slippage beyond top-of-book.

use super::{ExecutionBackend, PlaceOrderRequest, PlacementAck, PlacementStatus};
use crate::book::BookStore;
use crate::core::{AccountState, Fill, Order, OrderType, Position, Side, Symbol, TimeInForce};
use anyhow::Result;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

const LEVERAGE: u32 = 20;
const STARTING_CASH: Decimal = dec!(10_000);

#[derive(Clone)]
struct RestingOrder {
    venue_order_id: u64,
    symbol: Symbol,
    side: Side,
    price: Decimal,
    size: Decimal,
}

struct State {
    next_venue_id: u64,
    resting: HashMap<u64, RestingOrder>,
    fills: Vec<Fill>,
    positions: HashMap<Symbol, Position>,
    cash: Decimal,
}

/// Matches resting orders against the observed public book rather than
/// filling instantly, honoring the same [`ExecutionBackend`] contract the
/// live backend does.
pub struct PaperExecutor {
    books: Arc<BookStore>,
    state: Mutex<State>,
    last_tick_ms: AtomicI64,
}

impl PaperExecutor {
    pub fn new(books: Arc<BookStore>) -> Self {
        Self {
            books,
            state: Mutex::new(State {
                next_venue_id: 1,
                resting: HashMap::new(),
                fills: Vec::new(),
                positions: HashMap::new(),
                cash: STARTING_CASH,
            }),
            last_tick_ms: AtomicI64::new(0),
        }
    }

    /// Called once per tick in paper mode, before strategy invocation: match
    /// every resting order against the current book and return whatever
    /// fills result. The engine routes these through the order manager and
    /// strategy.on_fill.
    pub fn check_resting_orders(&self, now_ms: i64) -> Vec<Fill> {
        self.last_tick_ms.store(now_ms, Ordering::Relaxed);
        let mut state = self.state.lock();
        let mut produced = Vec::new();
        let mut filled_ids = Vec::new();

        for order in state.resting.values() {
            let Some(book) = self.books.get(&order.symbol) else {
                continue;
            };
            let crosses = match order.side {
                Side::Buy => book.best_ask().map(|a| a.price <= order.price).unwrap_or(false),
                Side::Sell => book.best_bid().map(|b| b.price >= order.price).unwrap_or(false),
            };
            if crosses {
                let fill_price = match order.side {
                    Side::Buy => book.best_ask().unwrap().price,
                    Side::Sell => book.best_bid().unwrap().price,
                };
                let fill = make_fill(order.symbol.clone(), order.side, fill_price, order.size, order.venue_order_id, now_ms, false);
                apply_fill_to_position(&mut state, &fill);
                produced.push(fill.clone());
                state.fills.push(fill);
                filled_ids.push(order.venue_order_id);
            }
        }

        for id in filled_ids {
            state.resting.remove(&id);
        }
        produced
    }

    fn place_one(&self, symbol: &Symbol, request: &PlaceOrderRequest, now_ms: i64) -> PlacementStatus {
        if request.size <= Decimal::ZERO {
            return PlacementStatus::Error {
                message: "order size must be positive".to_string(),
            };
        }

        match request.time_in_force {
            TimeInForce::Ioc => {
                let Some(book) = self.books.get(symbol) else {
                    return PlacementStatus::Error {
                        message: "IOC would not fill".to_string(),
                    };
                };
                let crosses = match request.side {
                    Side::Buy => book.best_ask().map(|a| a.price <= request.price).unwrap_or(false),
                    Side::Sell => book.best_bid().map(|b| b.price >= request.price).unwrap_or(false),
                };
                if !crosses {
                    return PlacementStatus::Error {
                        message: "IOC would not fill".to_string(),
                    };
                }
                let fill_price = match request.side {
                    Side::Buy => book.best_ask().unwrap().price,
                    Side::Sell => book.best_bid().unwrap().price,
                };
                let mut state = self.state.lock();
                let venue_order_id = state.next_venue_id;
                state.next_venue_id += 1;
                let fill = make_fill(symbol.clone(), request.side, fill_price, request.size, venue_order_id, now_ms, true);
                apply_fill_to_position(&mut state, &fill);
                state.fills.push(fill);
                PlacementStatus::Filled { venue_order_id }
            }
            TimeInForce::Gtc => {
                let mut state = self.state.lock();
                let venue_order_id = state.next_venue_id;
                state.next_venue_id += 1;
                state.resting.insert(
                    venue_order_id,
                    RestingOrder {
                        venue_order_id,
                        symbol: symbol.clone(),
                        side: request.side,
                        price: request.price,
                        size: request.size,
                    },
                );
                PlacementStatus::Resting { venue_order_id }
            }
        }
    }
}

fn make_fill(symbol: Symbol, side: Side, price: Decimal, size: Decimal, venue_order_id: u64, now_ms: i64, crossed: bool) -> Fill {
    Fill {
        symbol,
        side,
        price,
        size,
        venue_order_id,
        fee: Decimal::ZERO,
        timestamp_ms: now_ms,
        closed_pnl: Decimal::ZERO,
        crossed,
    }
}

/// Position arithmetic exactly per the source `_update_position`:
/// same-direction adds average the entry price by size; opposite-direction
/// partial reduces leave entry unchanged; a fully-closing fill realizes PnL
/// into cash and deletes the position.
fn apply_fill_to_position(state: &mut State, fill: &Fill) {
    let delta = fill.size * Decimal::from(fill.side.sign());

    let existing = state.positions.get(&fill.symbol).cloned();
    match existing {
        None => {
            state.positions.insert(
                fill.symbol.clone(),
                Position {
                    symbol: fill.symbol.clone(),
                    size: delta,
                    entry_price: fill.price,
                    unrealized_pnl: Decimal::ZERO,
                    leverage: LEVERAGE,
                    liquidation_price: None,
                    margin_used: (fill.price * fill.size) / Decimal::from(LEVERAGE),
                },
            );
        }
        Some(mut position) => {
            let old_szi = position.size;
            let new_szi = old_szi + delta;
            let same_direction = old_szi.signum() == delta.signum() || old_szi == Decimal::ZERO;

            if same_direction {
                let old_abs = old_szi.abs();
                let delta_abs = delta.abs();
                let new_abs = new_szi.abs();
                if new_abs > Decimal::ZERO {
                    position.entry_price =
                        (position.entry_price * old_abs + fill.price * delta_abs) / new_abs;
                }
                position.size = new_szi;
                position.margin_used = (position.entry_price * new_abs) / Decimal::from(LEVERAGE);
                state.positions.insert(fill.symbol.clone(), position);
            } else if new_szi == Decimal::ZERO {
                let realized = (fill.price - position.entry_price) * delta.abs() * old_szi.signum();
                state.cash += realized;
                state.positions.remove(&fill.symbol);
            } else {
                position.size = new_szi;
                position.margin_used = (position.entry_price * new_szi.abs()) / Decimal::from(LEVERAGE);
                state.positions.insert(fill.symbol.clone(), position);
            }
        }
    }
}

impl ExecutionBackend for PaperExecutor {
    fn place_order(&self, symbol: &Symbol, request: &PlaceOrderRequest) -> PlacementAck {
        let now_ms = self.last_tick_ms.load(Ordering::Relaxed);
        PlacementAck::single(self.place_one(symbol, request, now_ms))
    }

    fn place_bulk_orders(&self, symbol: &Symbol, requests: &[PlaceOrderRequest]) -> PlacementAck {
        let now_ms = self.last_tick_ms.load(Ordering::Relaxed);
        let statuses = requests.iter().map(|r| self.place_one(symbol, r, now_ms)).collect();
        PlacementAck { statuses }
    }

    fn cancel_order(&self, _symbol: &Symbol, venue_order_id: u64) -> PlacementAck {
        let mut state = self.state.lock();
        if state.resting.remove(&venue_order_id).is_some() {
            PlacementAck::single(PlacementStatus::Resting { venue_order_id })
        } else {
            PlacementAck::error(format!("no resting order with venue id {venue_order_id}"))
        }
    }

    fn cancel_bulk(&self, symbol: &Symbol, venue_order_ids: &[u64]) -> PlacementAck {
        let statuses = venue_order_ids
            .iter()
            .map(|id| match self.cancel_order(symbol, *id).statuses.into_iter().next() {
                Some(s) => s,
                None => PlacementStatus::Error {
                    message: "cancel failed".to_string(),
                },
            })
            .collect();
        PlacementAck { statuses }
    }

    fn cancel_all(&self, symbol: &Symbol) -> Result<()> {
        let mut state = self.state.lock();
        state.resting.retain(|_, o| &o.symbol != symbol);
        Ok(())
    }

    fn get_open_orders(&self, symbol: Option<&Symbol>) -> Result<Vec<Order>> {
        // The paper backend tracks resting orders by venue id only; the order
        // manager is the source of truth for full `Order` records. This
        // operation is only meaningful for a live backend's reconciliation
        // path; paper mode returns an empty list.
        let _ = symbol;
        Ok(vec![])
    }

    fn get_user_state(&self) -> Result<AccountState> {
        let state = self.state.lock();
        let total_margin_used = state.positions.values().fold(Decimal::ZERO, |acc, p| acc + p.margin_used);
        Ok(AccountState {
            account_value: state.cash,
            total_margin_used,
            withdrawable: state.cash - total_margin_used,
            positions: state.positions.clone(),
        })
    }

    fn get_user_fills(&self) -> Result<Vec<Fill>> {
        Ok(self.state.lock().fills.clone())
    }

    fn check_resting_orders(&self, now_ms: i64) -> Vec<Fill> {
        PaperExecutor::check_resting_orders(self, now_ms)
    }
}
