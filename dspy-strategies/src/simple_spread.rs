//! Simple spread: symmetric quotes around mid, requoted once mid drifts past
//! a threshold.
//!
//! Grounded on the teacher's `simple_spread` strategy's intent (fixed-spread
//! market making) but expressed against [`dspy_core::Strategy`]'s
//! `Option<StrategyDecision>` contract rather than a const-generic
//! zero-sized type, since the engine dispatches to one boxed strategy per
//! process, not a compile-time-selected one.

use crate::fees::FeeSchedule;
use dspy_core::{AccountState, DesiredOrder, L2BookSnapshot, Order, Side, Strategy, StrategyDecision, Symbol};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::debug;

/// Quotes `order_size` on both sides of mid, `spread_bps` wide, and only
/// requotes when mid has moved more than `requote_threshold_bps` since the
/// last quote (or there are no open orders at all).
pub struct SimpleSpreadStrategy {
    spread_bps: Decimal,
    order_size: Decimal,
    requote_threshold_bps: Decimal,
    fees: FeeSchedule,
    last_quoted_mid: HashMap<Symbol, Decimal>,
}

impl SimpleSpreadStrategy {
    pub fn new(spread_bps: Decimal, order_size: Decimal, requote_threshold_bps: Decimal) -> Self {
        Self {
            spread_bps,
            order_size,
            requote_threshold_bps,
            fees: FeeSchedule::default(),
            last_quoted_mid: HashMap::new(),
        }
    }

    pub fn with_fee_schedule(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    fn should_requote(&self, symbol: &Symbol, mid: Decimal, have_open_orders: bool) -> bool {
        if !have_open_orders {
            return true;
        }
        match self.last_quoted_mid.get(symbol) {
            None => true,
            Some(last) if *last == Decimal::ZERO => true,
            Some(last) => {
                let drift_bps = ((mid - last) / last).abs() * dec!(10_000);
                drift_bps >= self.requote_threshold_bps
            }
        }
    }
}

impl Strategy for SimpleSpreadStrategy {
    fn on_tick(
        &mut self,
        symbol: &Symbol,
        book: Option<&L2BookSnapshot>,
        _account: &AccountState,
        open_orders: &[Order],
    ) -> Option<StrategyDecision> {
        let book = book?;
        let mid = book.mid()?;

        if !self.should_requote(symbol, mid, !open_orders.is_empty()) {
            return None;
        }

        let min_bps = Decimal::from(self.fees.min_profitable_spread_bps());
        let spread_bps = self.spread_bps.max(min_bps);
        let spread_bps_u32 = spread_bps.round().to_u32().unwrap_or(0);
        let (bid_price, ask_price) = self.fees.quote_prices(mid, spread_bps_u32);

        self.last_quoted_mid.insert(symbol.clone(), mid);
        debug!(%symbol, %mid, %bid_price, %ask_price, "requoting");

        Some(StrategyDecision {
            symbol: symbol.clone(),
            desired_orders: vec![
                DesiredOrder::new(Side::Buy, bid_price, self.order_size),
                DesiredOrder::new(Side::Sell, ask_price, self.order_size),
            ],
            cancel_all_first: !open_orders.is_empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{book, flat_account};
    use dspy_core::{OrderStatus, OrderType, TimeInForce};

    fn strategy() -> SimpleSpreadStrategy {
        SimpleSpreadStrategy::new(dec!(10), dec!(0.01), dec!(5))
    }

    fn resting_order(symbol: &Symbol, price: Decimal) -> Order {
        Order {
            client_id: 1,
            venue_order_id: Some(1),
            symbol: symbol.clone(),
            side: Side::Buy,
            price,
            size: dec!(0.01),
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            reduce_only: false,
            status: OrderStatus::Open,
            filled_size: Decimal::ZERO,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn no_book_yields_no_decision() {
        let mut s = strategy();
        let decision = s.on_tick(&Symbol::from("BTC"), None, &flat_account(), &[]);
        assert!(decision.is_none());
    }

    #[test]
    fn first_tick_with_no_open_orders_quotes_both_sides() {
        let mut s = strategy();
        let b = book("BTC", dec!(67500), dec!(67510));
        let decision = s.on_tick(&Symbol::from("BTC"), Some(&b), &flat_account(), &[]).unwrap();
        assert_eq!(decision.desired_orders.len(), 2);
        assert!(!decision.cancel_all_first);
    }

    #[test]
    fn small_mid_drift_does_not_requote() {
        let mut s = strategy();
        let symbol = Symbol::from("BTC");
        let b1 = book("BTC", dec!(67500), dec!(67510));
        let open = s.on_tick(&symbol, Some(&b1), &flat_account(), &[]).unwrap();

        let fake_open = vec![resting_order(&symbol, open.desired_orders[0].price)];

        let b2 = book("BTC", dec!(67500.10), dec!(67510.10));
        let decision = s.on_tick(&symbol, Some(&b2), &flat_account(), &fake_open);
        assert!(decision.is_none());
    }

    #[test]
    fn large_mid_drift_requotes_and_cancels_first() {
        let mut s = strategy();
        let symbol = Symbol::from("BTC");
        let b1 = book("BTC", dec!(67500), dec!(67510));
        s.on_tick(&symbol, Some(&b1), &flat_account(), &[]).unwrap();

        let fake_open = vec![resting_order(&symbol, dec!(67495))];

        let b2 = book("BTC", dec!(68200), dec!(68210));
        let decision = s.on_tick(&symbol, Some(&b2), &flat_account(), &fake_open).unwrap();
        assert!(decision.cancel_all_first);
    }
}
