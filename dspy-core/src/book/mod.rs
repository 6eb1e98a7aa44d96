//! Book store: a thread-safe container of the latest immutable L2 snapshot per symbol.
//!
//! Contract is last-writer-wins with no merging and no cross-symbol ordering
//! guarantee. Snapshots are deeply immutable, so a reader can hold one across a
//! strategy call without ever touching the store's lock again.

use crate::core::{L2BookSnapshot, Symbol};
use dashmap::DashMap;
use std::sync::Arc;

/// Maps symbol -> latest [`L2BookSnapshot`].
///
/// One writer thread per subscription, one reader thread (the tick loop); `DashMap`
/// gives us per-shard locking so a writer for one symbol never blocks a reader of
/// another.
#[derive(Default)]
pub struct BookStore {
    snapshots: DashMap<Symbol, Arc<L2BookSnapshot>>,
}

impl BookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `snapshot.symbol`. Last writer wins.
    pub fn update(&self, snapshot: L2BookSnapshot) {
        self.snapshots.insert(snapshot.symbol.clone(), Arc::new(snapshot));
    }

    /// The current snapshot for `symbol`, if one has ever been published.
    pub fn get(&self, symbol: &Symbol) -> Option<Arc<L2BookSnapshot>> {
        self.snapshots.get(symbol).map(|entry| entry.clone())
    }

    /// A point-in-time copy of every symbol's latest snapshot.
    pub fn get_all(&self) -> Vec<Arc<L2BookSnapshot>> {
        self.snapshots.iter().map(|entry| entry.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PriceLevel;
    use rust_decimal_macros::dec;

    fn snap(symbol: &str, bid: rust_decimal::Decimal) -> L2BookSnapshot {
        L2BookSnapshot::new(
            Symbol::from(symbol),
            vec![PriceLevel::new(bid, dec!(1), 1)],
            vec![PriceLevel::new(bid + dec!(1), dec!(1), 1)],
            0,
        )
    }

    #[test]
    fn last_writer_wins_per_symbol() {
        let store = BookStore::new();
        store.update(snap("BTC", dec!(100)));
        store.update(snap("BTC", dec!(200)));
        assert_eq!(store.get(&Symbol::from("BTC")).unwrap().best_bid().unwrap().price, dec!(200));
    }

    #[test]
    fn missing_symbol_returns_none() {
        let store = BookStore::new();
        assert!(store.get(&Symbol::from("ETH")).is_none());
    }

    #[test]
    fn get_all_is_point_in_time_copy() {
        let store = BookStore::new();
        store.update(snap("BTC", dec!(100)));
        store.update(snap("ETH", dec!(10)));
        assert_eq!(store.get_all().len(), 2);
    }
}
