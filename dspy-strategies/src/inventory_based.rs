//! Avellaneda-Stoikov-lite: skews the reservation price away from mid in
//! proportion to current inventory, and widens the spread with realized
//! volatility.
//!
//! Built against [`dspy_core::Strategy`], using [`EwmaVolatility`] for its
//! volatility estimate rather than fixed-point rolling windows.

use crate::fees::FeeSchedule;
use crate::volatility::EwmaVolatility;
use dspy_core::{AccountState, DesiredOrder, L2BookSnapshot, Order, Side, Strategy, StrategyDecision, Symbol};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::debug;

/// Inventory-skewing, volatility-widening market maker.
///
/// For each symbol, the reservation price is `mid - inventory_skew_bps(size) *
/// gamma`, pushing quotes away from accumulating more of a position already
/// held, and the quoted half-spread widens with `volatility.bps()` on top of
/// the configured base spread.
pub struct InventoryBasedStrategy {
    base_spread_bps: Decimal,
    order_size: Decimal,
    /// How strongly inventory shifts the reservation price, in bps of mid
    /// per unit of `size / max_position_size`.
    inventory_gamma_bps: Decimal,
    /// Position size, in base-asset units, treated as "fully inventoried"
    /// for the purposes of skew scaling.
    max_position_size: Decimal,
    /// How many bps of extra half-spread to add per bps of volatility.
    volatility_gamma: Decimal,
    fees: FeeSchedule,
    volatility: HashMap<Symbol, EwmaVolatility>,
}

impl InventoryBasedStrategy {
    pub fn new(
        base_spread_bps: Decimal,
        order_size: Decimal,
        inventory_gamma_bps: Decimal,
        max_position_size: Decimal,
        volatility_gamma: Decimal,
    ) -> Self {
        Self {
            base_spread_bps,
            order_size,
            inventory_gamma_bps,
            max_position_size,
            volatility_gamma,
            fees: FeeSchedule::default(),
            volatility: HashMap::new(),
        }
    }

    pub fn with_fee_schedule(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    fn position_size(&self, symbol: &Symbol, account: &AccountState) -> Decimal {
        account.positions.get(symbol).map(|p| p.size).unwrap_or(Decimal::ZERO)
    }

    fn reservation_price(&self, mid: Decimal, inventory: Decimal) -> Decimal {
        if self.max_position_size <= Decimal::ZERO {
            return mid;
        }
        let inventory_fraction = (inventory / self.max_position_size).clamp(dec!(-1), dec!(1));
        let skew = mid * inventory_fraction * self.inventory_gamma_bps / dec!(10_000);
        mid - skew
    }

    fn half_spread_bps(&self, vol_bps: Decimal) -> Decimal {
        let min_bps = Decimal::from(self.fees.min_profitable_spread_bps());
        let widened = self.base_spread_bps + vol_bps * self.volatility_gamma;
        widened.max(min_bps) / dec!(2)
    }
}

impl Strategy for InventoryBasedStrategy {
    fn on_tick(
        &mut self,
        symbol: &Symbol,
        book: Option<&L2BookSnapshot>,
        account: &AccountState,
        open_orders: &[Order],
    ) -> Option<StrategyDecision> {
        let book = book?;
        let mid = book.mid()?;

        let vol = self.volatility.entry(symbol.clone()).or_insert_with(|| EwmaVolatility::new(dec!(0.1)));
        vol.observe(mid);
        let vol_bps = vol.bps();

        let inventory = self.position_size(symbol, account);
        let reservation = self.reservation_price(mid, inventory);
        let half_spread_bps = self.half_spread_bps(vol_bps);
        let half_spread = reservation * half_spread_bps / dec!(10_000);

        let bid_price = reservation - half_spread;
        let ask_price = reservation + half_spread;

        debug!(%symbol, %mid, %reservation, %inventory, %vol_bps, "requoting");

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
    use crate::test_helpers::{account_with_position, book, flat_account};

    fn strategy() -> InventoryBasedStrategy {
        InventoryBasedStrategy::new(dec!(10), dec!(0.01), dec!(20), dec!(1), dec!(2))
    }

    #[test]
    fn no_book_yields_no_decision() {
        let mut s = strategy();
        let decision = s.on_tick(&Symbol::from("BTC"), None, &flat_account(), &[]);
        assert!(decision.is_none());
    }

    #[test]
    fn flat_inventory_quotes_symmetric_around_mid() {
        let mut s = strategy();
        let symbol = Symbol::from("BTC");
        let b = book("BTC", dec!(67500), dec!(67510));
        let decision = s.on_tick(&symbol, Some(&b), &flat_account(), &[]).unwrap();
        let mid = b.mid().unwrap();
        let bid = decision.desired_orders[0].price;
        let ask = decision.desired_orders[1].price;
        assert!(bid < mid);
        assert!(ask > mid);
        assert!((mid - bid - (ask - mid)).abs() < dec!(0.0001));
    }

    #[test]
    fn long_inventory_skews_quotes_down() {
        let mut s = strategy();
        let symbol = Symbol::from("BTC");
        let b = book("BTC", dec!(67500), dec!(67510));
        let mid = b.mid().unwrap();

        let flat_decision = s.on_tick(&symbol, Some(&b), &flat_account(), &[]).unwrap();

        let mut s2 = strategy();
        let long_account = account_with_position("BTC", dec!(1), dec!(67000));
        let long_decision = s2.on_tick(&symbol, Some(&b), &long_account, &[]).unwrap();

        assert!(long_decision.desired_orders[0].price < flat_decision.desired_orders[0].price);
        assert!(long_decision.desired_orders[1].price < flat_decision.desired_orders[1].price);
        assert!(long_decision.desired_orders[0].price < mid);
    }

    #[test]
    fn short_inventory_skews_quotes_up() {
        let mut s = strategy();
        let symbol = Symbol::from("BTC");
        let b = book("BTC", dec!(67500), dec!(67510));

        let flat_decision = s.on_tick(&symbol, Some(&b), &flat_account(), &[]).unwrap();

        let mut s2 = strategy();
        let short_account = account_with_position("BTC", dec!(-1), dec!(68000));
        let short_decision = s2.on_tick(&symbol, Some(&b), &short_account, &[]).unwrap();

        assert!(short_decision.desired_orders[0].price > flat_decision.desired_orders[0].price);
        assert!(short_decision.desired_orders[1].price > flat_decision.desired_orders[1].price);
    }

    #[test]
    fn repeated_ticks_widen_spread_as_volatility_rises() {
        let mut s = strategy();
        let symbol = Symbol::from("BTC");
        let prices = [dec!(67500), dec!(68000), dec!(67200), dec!(68100), dec!(67000), dec!(68300)];
        let mut last_half_spread = Decimal::ZERO;
        for (i, p) in prices.iter().enumerate() {
            let b = book("BTC", *p, *p + dec!(10));
            let decision = s.on_tick(&symbol, Some(&b), &flat_account(), &[]).unwrap();
            let half_spread = decision.desired_orders[1].price - decision.desired_orders[0].price;
            if i == prices.len() - 1 {
                assert!(half_spread >= last_half_spread);
            }
            last_half_spread = half_spread;
        }
    }
}
