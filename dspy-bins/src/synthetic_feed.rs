//! A synthetic, in-process market-data feed.
//!
//! `dspy-core`'s `gateway::MarketDataClient` trait deliberately excludes any
//! real venue transport (websocket framing, REST signing) — callers supply
//! their own implementation. A random-walk feed like this one gives
//! `dspy-engine` something to run against without implementing a venue SDK.

use dashmap::DashMap;
use dspy_core::order_manager::OrderUpdateEvent;
use dspy_core::{Fill, L2BookSnapshot, MarketDataClient, PriceLevel, Symbol};
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Generates a random-walk mid price per symbol and calls back on a fixed
/// cadence, independent of the engine's own tick interval.
pub struct SyntheticMarketData {
    mids: Arc<DashMap<Symbol, Decimal>>,
    base_price: Decimal,
    half_spread: Decimal,
    step_interval: Duration,
    stopped: Arc<AtomicBool>,
    next_sub_id: AtomicU64,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SyntheticMarketData {
    pub fn new(base_price: Decimal, half_spread: Decimal, step_interval: Duration) -> Self {
        Self {
            mids: Arc::new(DashMap::new()),
            base_price,
            half_spread,
            step_interval,
            stopped: Arc::new(AtomicBool::new(false)),
            next_sub_id: AtomicU64::new(1),
            handles: Mutex::new(Vec::new()),
        }
    }

    fn current_mid(&self, symbol: &Symbol) -> Decimal {
        *self.mids.entry(symbol.clone()).or_insert(self.base_price)
    }

    fn snapshot(&self, symbol: &Symbol) -> L2BookSnapshot {
        let mid = self.current_mid(symbol);
        L2BookSnapshot::new(
            symbol.clone(),
            vec![PriceLevel::new(mid - self.half_spread, Decimal::ONE, 1)],
            vec![PriceLevel::new(mid + self.half_spread, Decimal::ONE, 1)],
            now_ms(),
        )
    }

    fn next_subscription_id(&self) -> u64 {
        self.next_sub_id.fetch_add(1, Ordering::Relaxed)
    }

    fn spawn_feed(&self, symbol: Symbol, callback: Box<dyn Fn(L2BookSnapshot) + Send>) -> JoinHandle<()> {
        let mids = Arc::clone(&self.mids);
        let stopped = Arc::clone(&self.stopped);
        let half_spread = self.half_spread;
        let interval = self.step_interval;
        let base_price = self.base_price;

        thread::spawn(move || {
            let mut rng = rand::thread_rng();
            while !stopped.load(Ordering::Relaxed) {
                let mut mid = *mids.entry(symbol.clone()).or_insert(base_price);
                let step = Decimal::from(rng.gen_range(-3..=3)) * half_spread / Decimal::from(10);
                mid += step;
                if mid <= Decimal::ZERO {
                    mid = base_price;
                }
                mids.insert(symbol.clone(), mid);

                let snapshot = L2BookSnapshot::new(
                    symbol.clone(),
                    vec![PriceLevel::new(mid - half_spread, Decimal::ONE, 1)],
                    vec![PriceLevel::new(mid + half_spread, Decimal::ONE, 1)],
                    now_ms(),
                );
                callback(snapshot);
                thread::sleep(interval);
            }
        })
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl MarketDataClient for SyntheticMarketData {
    fn subscribe_l2(
        &self,
        symbol: &Symbol,
        callback: Box<dyn Fn(L2BookSnapshot) + Send>,
    ) -> anyhow::Result<u64> {
        let handle = self.spawn_feed(symbol.clone(), callback);
        self.handles.lock().unwrap().push(handle);
        Ok(self.next_subscription_id())
    }

    fn subscribe_bbo(
        &self,
        symbol: &Symbol,
        callback: Box<dyn Fn(L2BookSnapshot) + Send>,
    ) -> anyhow::Result<u64> {
        self.subscribe_l2(symbol, callback)
    }

    fn subscribe_trades(
        &self,
        _symbol: &Symbol,
        _callback: Box<dyn Fn(serde_json::Value) + Send>,
    ) -> anyhow::Result<u64> {
        Ok(self.next_subscription_id())
    }

    fn subscribe_user_fills(
        &self,
        _address: &str,
        _callback: Box<dyn Fn(Fill) + Send>,
    ) -> anyhow::Result<u64> {
        Ok(self.next_subscription_id())
    }

    fn subscribe_order_updates(
        &self,
        _address: &str,
        _callback: Box<dyn Fn(Vec<OrderUpdateEvent>) + Send>,
    ) -> anyhow::Result<u64> {
        Ok(self.next_subscription_id())
    }

    fn get_l2_snapshot(&self, symbol: &Symbol) -> anyhow::Result<L2BookSnapshot> {
        Ok(self.snapshot(symbol))
    }

    fn get_all_mids(&self) -> anyhow::Result<HashMap<Symbol, Decimal>> {
        Ok(self.mids.iter().map(|entry| (entry.key().clone(), *entry.value())).collect())
    }

    fn get_meta(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::json!({ "source": "synthetic" }))
    }

    fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let mut handles = self.handles.lock().unwrap();
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[test]
    fn get_l2_snapshot_seeds_around_base_price() {
        let feed = SyntheticMarketData::new(Decimal::from(50_000), Decimal::from(5), StdDuration::from_millis(1));
        let symbol = Symbol::from("BTC");
        let snapshot = feed.get_l2_snapshot(&symbol).unwrap();
        assert_eq!(snapshot.mid(), Some(Decimal::from(50_000)));
    }

    #[test]
    fn shutdown_stops_spawned_feed_threads() {
        let feed = SyntheticMarketData::new(Decimal::from(100), Decimal::from(1), StdDuration::from_millis(1));
        let symbol = Symbol::from("BTC");
        feed.subscribe_l2(&symbol, Box::new(|_| {})).unwrap();
        thread::sleep(StdDuration::from_millis(10));
        feed.shutdown();
        assert!(feed.stopped.load(Ordering::SeqCst));
    }
}
