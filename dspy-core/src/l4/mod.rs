//! L4 (order-by-order) book maintainer.
//!
//! Folds one snapshot message followed by a sequence of diffs into a consistent
//! per-price-level set of individual resting orders, per symbol. Wire shape is
//! `{bids, asks}` for a snapshot and `{bidDiffs, askDiffs}` for a diff, each diff
//! entry `{oid, user, limitPx, sz}` with `sz = "0"` meaning remove.
//!
//! The maintainer does not own the socket; it is fed raw JSON payloads by
//! whatever thread reads the L4 websocket (see `gateway`), and in turn invokes
//! per-symbol callbacks with the *raw* payload before updating its own state, so
//! a recorder can see exactly what the venue sent.

pub mod client;

pub use client::{L4Client, L4ClientHandle, L4Event, L4Transport};

use crate::core::{L4BookSnapshot, L4Order, Side, Symbol};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct WireEntry {
    oid: u64,
    user: String,
    #[serde(alias = "px", alias = "limitPx")]
    px: Decimal,
    sz: Decimal,
}

#[derive(Debug, Deserialize)]
struct SnapshotPayload {
    bids: Vec<WireEntry>,
    asks: Vec<WireEntry>,
}

#[derive(Debug, Deserialize)]
struct DiffPayload {
    #[serde(rename = "bidDiffs", default)]
    bid_diffs: Vec<WireEntry>,
    #[serde(rename = "askDiffs", default)]
    ask_diffs: Vec<WireEntry>,
}

type RawCallback = Box<dyn Fn(&Symbol, &serde_json::Value) + Send + Sync>;

/// Per-symbol order-by-order book state, fed raw L4 websocket payloads.
pub struct L4Maintainer {
    books: parking_lot::Mutex<std::collections::HashMap<Symbol, L4BookSnapshot>>,
    snapshot_received: parking_lot::Mutex<HashSet<Symbol>>,
    callbacks: parking_lot::Mutex<Vec<(Symbol, RawCallback)>>,
}

impl Default for L4Maintainer {
    fn default() -> Self {
        Self::new()
    }
}

impl L4Maintainer {
    pub fn new() -> Self {
        Self {
            books: parking_lot::Mutex::new(std::collections::HashMap::new()),
            snapshot_received: parking_lot::Mutex::new(HashSet::new()),
            callbacks: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Register a callback invoked with the raw payload for `symbol`, before
    /// internal state is updated. Panics inside the callback are not caught by
    /// this type; callers are expected to not panic and the engine wraps calls
    /// into `l4.apply` with its own error boundary.
    pub fn on_raw_message(&self, symbol: Symbol, callback: RawCallback) {
        self.callbacks.lock().push((symbol, callback));
    }

    /// Clear the snapshot-received marker for every symbol. Call this on
    /// websocket reconnect: the next message per symbol is reinterpreted as a
    /// snapshot rather than a diff.
    pub fn reset(&self) {
        self.snapshot_received.lock().clear();
    }

    /// Apply one raw message for `symbol`. First message since construction or
    /// the last `reset()` is treated as a snapshot; everything after is a diff.
    pub fn apply(&self, symbol: &Symbol, raw: &serde_json::Value) {
        for (cb_symbol, callback) in self.callbacks.lock().iter() {
            if cb_symbol == symbol {
                callback(symbol, raw);
            }
        }

        let is_first = {
            let mut received = self.snapshot_received.lock();
            received.insert(symbol.clone())
        };

        if is_first {
            match serde_json::from_value::<SnapshotPayload>(raw.clone()) {
                Ok(payload) => self.apply_snapshot(symbol, payload),
                Err(e) => warn!(%symbol, error = %e, "malformed L4 snapshot payload"),
            }
        } else {
            match serde_json::from_value::<DiffPayload>(raw.clone()) {
                Ok(payload) => self.apply_diff(symbol, payload),
                Err(e) => warn!(%symbol, error = %e, "malformed L4 diff payload"),
            }
        }
    }

    fn apply_snapshot(&self, symbol: &Symbol, payload: SnapshotPayload) {
        let mut snapshot = L4BookSnapshot::empty(symbol.clone());
        for entry in payload.bids {
            insert_entry(&mut snapshot.bids, symbol, entry, Side::Buy);
        }
        for entry in payload.asks {
            insert_entry(&mut snapshot.asks, symbol, entry, Side::Sell);
        }
        debug!(%symbol, "applied L4 snapshot");
        self.books.lock().insert(symbol.clone(), snapshot);
    }

    fn apply_diff(&self, symbol: &Symbol, payload: DiffPayload) {
        let mut books = self.books.lock();
        let snapshot = books
            .entry(symbol.clone())
            .or_insert_with(|| L4BookSnapshot::empty(symbol.clone()));

        for entry in payload.bid_diffs {
            apply_side_diff(&mut snapshot.bids, symbol, entry, Side::Buy);
        }
        for entry in payload.ask_diffs {
            apply_side_diff(&mut snapshot.asks, symbol, entry, Side::Sell);
        }
    }

    /// The latest published snapshot for `symbol`, if any.
    pub fn get(&self, symbol: &Symbol) -> Option<L4BookSnapshot> {
        self.books.lock().get(symbol).cloned()
    }
}

fn insert_entry(
    book_side: &mut std::collections::BTreeMap<Decimal, Vec<L4Order>>,
    symbol: &Symbol,
    entry: WireEntry,
    side: Side,
) {
    let _ = symbol;
    book_side.entry(entry.px).or_default().push(L4Order {
        venue_order_id: entry.oid,
        owner: entry.user,
        price: entry.px,
        size: entry.sz,
        side,
    });
}

/// Remove any existing entry for `entry.oid` from wherever it currently sits
/// (the diff may carry a new price for a known order), then, unless `sz == 0`,
/// insert the updated order at the diff's price.
fn apply_side_diff(
    book_side: &mut std::collections::BTreeMap<Decimal, Vec<L4Order>>,
    symbol: &Symbol,
    entry: WireEntry,
    side: Side,
) {
    let _ = symbol;
    let mut empty_prices = Vec::new();
    for (price, orders) in book_side.iter_mut() {
        orders.retain(|o| o.venue_order_id != entry.oid);
        if orders.is_empty() {
            empty_prices.push(*price);
        }
    }
    for price in empty_prices {
        book_side.remove(&price);
    }

    if entry.sz != Decimal::ZERO {
        book_side.entry(entry.px).or_default().push(L4Order {
            venue_order_id: entry.oid,
            owner: entry.user,
            price: entry.px,
            size: entry.sz,
            side,
        });
    }
}

/// Wraps a maintainer handle so it can be shared across the L4 ingest thread
/// and the ping thread without re-locking at the call site.
pub type SharedL4Maintainer = Arc<L4Maintainer>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn btc() -> Symbol {
        Symbol::from("BTC")
    }

    #[test]
    fn first_message_is_a_snapshot() {
        let maintainer = L4Maintainer::new();
        let raw = json!({
            "bids": [{"oid": 1, "user": "0xabc", "px": "67500", "sz": "1"}],
            "asks": []
        });
        maintainer.apply(&btc(), &raw);
        let book = maintainer.get(&btc()).unwrap();
        assert_eq!(book.best_bid(), Some(dec!(67500)));
    }

    #[test]
    fn diff_with_zero_size_removes_order() {
        let maintainer = L4Maintainer::new();
        maintainer.apply(
            &btc(),
            &json!({"bids": [{"oid": 1, "user": "0xabc", "px": "67500", "sz": "1"}], "asks": []}),
        );
        maintainer.apply(
            &btc(),
            &json!({"bidDiffs": [{"oid": 1, "user": "0xabc", "limitPx": "67500", "sz": "0"}], "askDiffs": []}),
        );
        let book = maintainer.get(&btc()).unwrap();
        assert_eq!(book.best_bid(), None);
        assert!(!book.bids.contains_key(&dec!(67500)));
    }

    #[test]
    fn diff_with_nonzero_size_replaces_existing_order() {
        let maintainer = L4Maintainer::new();
        maintainer.apply(
            &btc(),
            &json!({"bids": [{"oid": 1, "user": "0xabc", "px": "67500", "sz": "1"}], "asks": []}),
        );
        maintainer.apply(
            &btc(),
            &json!({"bidDiffs": [{"oid": 1, "user": "0xabc", "limitPx": "67500", "sz": "2"}], "askDiffs": []}),
        );
        let book = maintainer.get(&btc()).unwrap();
        let at_price = &book.bids[&dec!(67500)];
        assert_eq!(at_price.len(), 1);
        assert_eq!(at_price[0].size, dec!(2));
    }

    #[test]
    fn reset_causes_next_message_to_be_treated_as_snapshot() {
        let maintainer = L4Maintainer::new();
        maintainer.apply(
            &btc(),
            &json!({"bids": [{"oid": 1, "user": "0xabc", "px": "67500", "sz": "1"}], "asks": []}),
        );
        maintainer.reset();
        maintainer.apply(
            &btc(),
            &json!({"bids": [{"oid": 2, "user": "0xdef", "px": "68000", "sz": "1"}], "asks": []}),
        );
        let book = maintainer.get(&btc()).unwrap();
        assert_eq!(book.best_bid(), Some(dec!(68000)));
        assert!(!book.bids.contains_key(&dec!(67500)));
    }

    #[test]
    fn raw_callback_fires_before_state_update() {
        let maintainer = L4Maintainer::new();
        let seen = Arc::new(parking_lot::Mutex::new(false));
        let seen_clone = seen.clone();
        maintainer.on_raw_message(
            btc(),
            Box::new(move |_sym, _raw| {
                *seen_clone.lock() = true;
            }),
        );
        maintainer.apply(
            &btc(),
            &json!({"bids": [{"oid": 1, "user": "0xabc", "px": "67500", "sz": "1"}], "asks": []}),
        );
        assert!(*seen.lock());
    }
}
