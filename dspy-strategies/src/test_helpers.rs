//! Test fixtures shared by the strategy unit tests.

use dspy_core::{AccountState, L2BookSnapshot, Position, PriceLevel, Symbol};
use rust_decimal::Decimal;

pub fn book(symbol: &str, bid: Decimal, ask: Decimal) -> L2BookSnapshot {
    L2BookSnapshot::new(
        Symbol::from(symbol),
        vec![PriceLevel::new(bid, Decimal::ONE, 1)],
        vec![PriceLevel::new(ask, Decimal::ONE, 1)],
        0,
    )
}

/// An account with no open positions and a generous cash cushion.
pub fn flat_account() -> AccountState {
    AccountState {
        account_value: Decimal::from(10_000),
        total_margin_used: Decimal::ZERO,
        withdrawable: Decimal::from(10_000),
        positions: Default::default(),
    }
}

/// An account holding one signed position on `symbol`.
pub fn account_with_position(symbol: &str, size: Decimal, entry_price: Decimal) -> AccountState {
    let mut positions = std::collections::HashMap::new();
    positions.insert(
        Symbol::from(symbol),
        Position {
            symbol: Symbol::from(symbol),
            size,
            entry_price,
            unrealized_pnl: Decimal::ZERO,
            leverage: 20,
            liquidation_price: None,
            margin_used: (entry_price * size.abs()) / Decimal::from(20),
        },
    );
    AccountState {
        account_value: Decimal::from(10_000),
        total_margin_used: Decimal::ZERO,
        withdrawable: Decimal::from(10_000),
        positions,
    }
}
