//! Strategy interface: a pure, side-effect-free contract invoked by the
//! engine once per tick, per configured symbol.
//!
//! Strategies are trait objects (`Box<dyn Strategy>`), not a const-generic
//! parameter — the engine drives an arbitrary, configuration-chosen strategy,
//! so the dispatch cost of one virtual call per symbol per tick is immaterial
//! next to the network round trips a decision triggers.

use crate::core::{AccountState, L2BookSnapshot, Order, StrategyDecision, Symbol};

/// Invoked by the engine each tick. Implementations must not block or sleep;
/// the engine calls this once per configured symbol, in symbol-list order,
/// within the tick loop's single thread.
pub trait Strategy: Send {
    /// Decide what this symbol's resting orders should look like, given the
    /// latest book (absent if no snapshot has ever arrived), the current
    /// account state, and this process's open orders for the symbol.
    fn on_tick(
        &mut self,
        symbol: &Symbol,
        book: Option<&L2BookSnapshot>,
        account: &AccountState,
        open_orders: &[Order],
    ) -> Option<StrategyDecision>;

    /// Called once per fill, after the order manager has absorbed it.
    fn on_fill(&mut self, _fill: &crate::core::Fill) {}

    /// Called once at engine startup, before the first tick.
    fn on_start(&mut self, _symbols: &[Symbol]) {}

    /// Called once at engine shutdown, before cancel-all.
    fn on_stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopStrategy;
    impl Strategy for NoopStrategy {
        fn on_tick(
            &mut self,
            _symbol: &Symbol,
            _book: Option<&L2BookSnapshot>,
            _account: &AccountState,
            _open_orders: &[Order],
        ) -> Option<StrategyDecision> {
            None
        }
    }

    #[test]
    fn default_hooks_are_callable_noops() {
        let mut strategy = NoopStrategy;
        strategy.on_start(&[Symbol::from("BTC")]);
        strategy.on_stop();
        assert!(strategy
            .on_tick(&Symbol::from("BTC"), None, &AccountState::zero(), &[])
            .is_none());
    }
}
