//! Exchange fee schedule for profitable market making.
//!
//! Fees are expressed in basis points (1 bp = 0.01%). Unlike the rest of the
//! accounting path this runs on whole-number bps, not `Decimal`, because fee
//! schedules are published by the venue as integers — the conversion to
//! `Decimal` happens once, at the point a fee is charged against a notional.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Maker/taker fee schedule, in basis points.
///
/// Defaults mirror a typical premium-tier perp venue: a near-zero maker fee
/// and a modest taker fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub maker_fee_bps: u32,
    pub taker_fee_bps: u32,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            maker_fee_bps: 0,
            taker_fee_bps: 2,
        }
    }
}

impl FeeSchedule {
    pub fn new(maker_fee_bps: u32, taker_fee_bps: u32) -> Self {
        Self {
            maker_fee_bps,
            taker_fee_bps,
        }
    }

    /// Cost of posting passively and exiting by taking: `maker + taker`.
    pub fn round_trip_cost_bps(&self) -> u32 {
        self.maker_fee_bps + self.taker_fee_bps
    }

    /// Narrowest spread that breaks even on a round trip after fees.
    pub fn min_profitable_spread_bps(&self) -> u32 {
        self.round_trip_cost_bps()
    }

    /// Spread required to clear `target_profit_bps` of profit after fees.
    pub fn required_spread_bps(&self, target_profit_bps: u32) -> u32 {
        self.round_trip_cost_bps() + target_profit_bps
    }

    /// Fee owed on a fill of the given notional at `fee_bps`.
    pub fn fee_amount(&self, notional: Decimal, fee_bps: u32) -> Decimal {
        notional * Decimal::from(fee_bps) / dec!(10000)
    }

    /// Bid/ask around `mid` that realize `target_spread_bps` of total spread.
    pub fn quote_prices(&self, mid: Decimal, target_spread_bps: u32) -> (Decimal, Decimal) {
        let half_spread = mid * Decimal::from(target_spread_bps) / dec!(20000);
        (mid - half_spread, mid + half_spread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_matches_round_trip_cost() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.maker_fee_bps, 0);
        assert_eq!(fees.taker_fee_bps, 2);
        assert_eq!(fees.round_trip_cost_bps(), 2);
        assert_eq!(fees.min_profitable_spread_bps(), 2);
    }

    #[test]
    fn fee_amount_scales_with_notional() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.fee_amount(dec!(50000), 2), dec!(10));
        assert_eq!(fees.fee_amount(dec!(50000), 10), dec!(50));
    }

    #[test]
    fn required_spread_adds_target_profit_to_fees() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.required_spread_bps(3), 5);
        assert_eq!(fees.required_spread_bps(10), 12);
    }

    #[test]
    fn quote_prices_are_symmetric_around_mid() {
        let fees = FeeSchedule::default();
        let (bid, ask) = fees.quote_prices(dec!(50000), 10);
        assert_eq!(bid, dec!(49975));
        assert_eq!(ask, dec!(50025));
        let spread_bps = (ask - bid) * dec!(10000) / dec!(50000);
        assert_eq!(spread_bps, dec!(10));
    }

    #[test]
    fn quoting_at_min_profitable_spread_covers_fees() {
        let fees = FeeSchedule::default();
        let (bid, ask) = fees.quote_prices(dec!(50000), fees.min_profitable_spread_bps());
        let spread_bps = (ask - bid) * dec!(10000) / dec!(50000);
        assert!(spread_bps >= Decimal::from(fees.round_trip_cost_bps()));
    }
}
