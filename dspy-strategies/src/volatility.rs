//! Exponentially-weighted realized volatility of mid-price returns.
//!
//! Grounded on the shape of the teacher's rolling-volatility estimators, but
//! expressed over [`Decimal`] mid prices rather than fixed-point integers,
//! since this sits on the strategy decision path, not a hot inner loop.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Tracks an EWMA of squared returns and exposes its square root as a
/// basis-points volatility estimate.
#[derive(Debug, Clone)]
pub struct EwmaVolatility {
    /// Smoothing factor in `(0, 1]`; higher reacts faster to new prints.
    alpha: Decimal,
    last_price: Option<Decimal>,
    variance: Decimal,
    count: usize,
}

impl EwmaVolatility {
    pub fn new(alpha: Decimal) -> Self {
        Self {
            alpha,
            last_price: None,
            variance: Decimal::ZERO,
            count: 0,
        }
    }

    /// Feed one new mid-price observation.
    pub fn observe(&mut self, price: Decimal) {
        if let Some(last) = self.last_price.replace(price) {
            if last != Decimal::ZERO {
                let ret = (price - last) / last;
                let squared = ret * ret;
                self.variance = self.alpha * squared + (Decimal::ONE - self.alpha) * self.variance;
            }
        }
        self.count += 1;
    }

    /// `true` once enough observations have accumulated for the estimate to
    /// be meaningful.
    pub fn is_ready(&self) -> bool {
        self.count >= 5
    }

    /// Current volatility estimate, in basis points of price per observation
    /// interval. `sqrt` is approximated with fixed-iteration Newton's method
    /// since `rust_decimal` has no built-in square root.
    pub fn bps(&self) -> Decimal {
        sqrt_decimal(self.variance) * dec!(10_000)
    }
}

/// Newton's method square root, adequate for the small non-negative inputs
/// this estimator produces; converges well within 20 iterations for any
/// realistic variance value.
fn sqrt_decimal(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let mut guess = value;
    for _ in 0..20 {
        guess = (guess + value / guess) / Decimal::TWO;
    }
    guess
}
