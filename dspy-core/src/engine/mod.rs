//! Engine: the tick-driven orchestrator wiring market data, strategy, and
//! order management together.
//!
//! Grounded on the original `engine.py`'s `Engine` class. A single tick
//! thread drives `_tick()` on a fixed cadence; background threads owned by
//! the gateway and the L4 client feed the book store, L4 maintainer, and
//! order manager via callbacks registered at startup. The engine itself
//! never blocks on network I/O — every suspension point is either a
//! websocket reader thread's blocking read or this loop's interruptible
//! sleep.

use crate::book::BookStore;
use crate::config::Config;
use crate::core::{AccountState, Fill, OrderType, Side, Symbol, TimeInForce};
use crate::gateway::Gateway;
use crate::l4::{L4ClientHandle, L4Maintainer};
use crate::monitoring::MetricsRegistry;
use crate::order_manager::{OrderManager, OrderUpdateEvent};
use crate::recorder::DataRecorder;
use crate::strategy::Strategy;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Terminal orders older than this are dropped from the tracking map every tick.
const TERMINAL_RETENTION_MS: i64 = 300_000;

/// Point-in-time counters for observability; cheap to read, not persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub ticks_completed: u64,
    pub tick_errors: u64,
    pub fills_processed: u64,
}

/// Everything needed to run one engine beyond what the gateway already owns.
/// The L4 client/maintainer pair and the recorder are optional, matching
/// `config.l4_server_url` and `config.recording.enabled` respectively; the
/// caller (not this crate) constructs the L4 transport, since that transport
/// is out of scope here.
pub struct Engine {
    config: Config,
    gateway: Arc<Gateway>,
    books: Arc<BookStore>,
    order_manager: Arc<OrderManager>,
    strategy: Arc<Mutex<Box<dyn Strategy>>>,
    l4_maintainer: Option<Arc<L4Maintainer>>,
    l4_client: Option<Arc<dyn L4ClientHandle>>,
    recorder: Option<Arc<Mutex<DataRecorder>>>,
    metrics: Option<Arc<MetricsRegistry>>,
    running: Arc<AtomicBool>,
    wake_lock: Arc<Mutex<()>>,
    wake_cv: Arc<Condvar>,
    ticks_completed: AtomicU64,
    tick_errors: AtomicU64,
    fills_processed: AtomicU64,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        gateway: Arc<Gateway>,
        books: Arc<BookStore>,
        strategy: Box<dyn Strategy>,
        l4: Option<(Arc<L4Maintainer>, Arc<dyn L4ClientHandle>)>,
        recorder: Option<DataRecorder>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        let (l4_maintainer, l4_client) = match l4 {
            Some((maintainer, client)) => (Some(maintainer), Some(client)),
            None => (None, None),
        };
        Self {
            config,
            gateway,
            books,
            order_manager: Arc::new(OrderManager::new()),
            strategy: Arc::new(Mutex::new(strategy)),
            l4_maintainer,
            l4_client,
            recorder: recorder.map(|r| Arc::new(Mutex::new(r))),
            metrics,
            running: Arc::new(AtomicBool::new(false)),
            wake_lock: Arc::new(Mutex::new(())),
            wake_cv: Arc::new(Condvar::new()),
            ticks_completed: AtomicU64::new(0),
            tick_errors: AtomicU64::new(0),
            fills_processed: AtomicU64::new(0),
        }
    }

    fn symbols(&self) -> Vec<Symbol> {
        self.config.trading.coins.iter().map(|c| Symbol::from(c.as_str())).collect()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            ticks_completed: self.ticks_completed.load(Ordering::Relaxed),
            tick_errors: self.tick_errors.load(Ordering::Relaxed),
            fills_processed: self.fills_processed.load(Ordering::Relaxed),
        }
    }

    /// Signal the engine to stop; wakes an in-progress sleep immediately.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _guard = self.wake_lock.lock();
        self.wake_cv.notify_all();
    }

    /// Run until `stop()` is called or a SIGINT/SIGTERM arrives. Blocks the
    /// calling thread; callers typically invoke this from `main`.
    pub fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.install_signal_handler();

        let coins = self.symbols();
        let mode = if self.config.paper_mode { "PAPER" } else { "LIVE" };
        info!(?coins, mode, "starting engine");

        self.subscribe_books();

        if self.recorder.is_some() && self.config.recording.record_trades {
            self.subscribe_trades();
        }

        if let (Some(l4_client), Some(maintainer)) = (&self.l4_client, &self.l4_maintainer) {
            if let Some(recorder) = &self.recorder {
                for symbol in &coins {
                    let recorder = Arc::clone(recorder);
                    let sym = symbol.clone();
                    maintainer.on_raw_message(
                        symbol.clone(),
                        Box::new(move |_sym, raw| recorder.lock().record_l4(&sym, raw)),
                    );
                }
            }
            l4_client.start();
            for symbol in &coins {
                l4_client.subscribe(symbol.clone());
            }
            info!(url = ?self.config.l4_server_url, "L4 client started");
        }

        if !self.config.paper_mode {
            if let Some(address) = self.config.wallet.account_address.clone() {
                self.subscribe_user_events(&address);
            }
        }

        self.strategy.lock().on_start(&coins);
        info!("engine started, entering tick loop");

        while self.running.load(Ordering::SeqCst) {
            let tick_start = Instant::now();
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.tick())).is_err() {
                error!("tick panicked, continuing");
                self.tick_errors.fetch_add(1, Ordering::Relaxed);
            }
            let elapsed = tick_start.elapsed();
            if let Some(metrics) = &self.metrics {
                metrics.trading().tick_duration_seconds.observe(elapsed.as_secs_f64());
            }

            let interval = Duration::from_secs_f64(self.config.tick_interval_s.max(0.0));
            let remaining = interval.saturating_sub(elapsed);
            if remaining > Duration::ZERO && self.running.load(Ordering::SeqCst) {
                let mut guard = self.wake_lock.lock();
                self.wake_cv.wait_for(&mut guard, remaining);
            }
        }

        self.shutdown();
    }

    /// One iteration of the tick loop: match paper fills, fetch account
    /// state, invoke the strategy per symbol, execute its decision, and
    /// garbage-collect terminal orders.
    fn tick(&self) {
        let now = now_ms();

        if self.config.paper_mode {
            let fills = self.gateway.execution().check_resting_orders(now);
            for fill in fills {
                self.apply_fill(&fill);
            }
        }

        let account = self.get_account_state();

        for symbol in self.symbols() {
            let book = self.books.get(&symbol);
            let open_orders = self.order_manager.get_open_orders(Some(&symbol));
            let decision = {
                let mut strategy = self.strategy.lock();
                strategy.on_tick(&symbol, book.as_deref(), &account, &open_orders)
            };

            if let Some(decision) = decision {
                self.execute_decision(&symbol, decision);
            }
        }

        self.order_manager.cleanup_terminal(TERMINAL_RETENTION_MS, now);
        self.ticks_completed.fetch_add(1, Ordering::Relaxed);
    }

    fn apply_fill(&self, fill: &Fill) {
        self.order_manager.on_fill(fill);
        self.strategy.lock().on_fill(fill);
        self.fills_processed.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            let side = match fill.side {
                Side::Buy => "buy",
                Side::Sell => "sell",
            };
            metrics.trading().fills_total.with_label_values(&[fill.symbol.as_str(), side]).inc();
        }
    }

    fn execute_decision(&self, symbol: &Symbol, decision: crate::core::StrategyDecision) {
        let now = now_ms();
        if decision.cancel_all_first {
            if let Err(e) = self.order_manager.cancel_all(self.gateway.execution().as_ref(), symbol, now) {
                warn!(%symbol, error = %e, "cancel_all failed");
            }
        }
        if !decision.desired_orders.is_empty() {
            let placed = self.order_manager.place_bulk(
                self.gateway.execution().as_ref(),
                symbol,
                &decision.desired_orders,
                now,
            );
            if let Some(metrics) = &self.metrics {
                for order in &placed {
                    let side = match order.side {
                        Side::Buy => "buy",
                        Side::Sell => "sell",
                    };
                    metrics.trading().orders_total.with_label_values(&[symbol.as_str(), side]).inc();
                    if order.status == crate::core::OrderStatus::Rejected {
                        metrics.trading().rejections_total.with_label_values(&[symbol.as_str()]).inc();
                    }
                }
            }
        }
    }

    /// Best-effort account snapshot; a failed fetch logs and substitutes a
    /// zero-valued state rather than propagating.
    fn get_account_state(&self) -> AccountState {
        match self.gateway.get_user_state() {
            Ok(account) => {
                if let Some(metrics) = &self.metrics {
                    metrics.account().account_value_usd.set(decimal_to_f64(account.account_value));
                    metrics.account().withdrawable_usd.set(decimal_to_f64(account.withdrawable));
                    metrics.account().margin_used_usd.set(decimal_to_f64(account.total_margin_used));
                    for (symbol, position) in &account.positions {
                        metrics
                            .account()
                            .position_size
                            .with_label_values(&[symbol.as_str()])
                            .set(decimal_to_f64(position.size));
                        metrics
                            .account()
                            .unrealized_pnl_usd
                            .with_label_values(&[symbol.as_str()])
                            .set(decimal_to_f64(position.unrealized_pnl));
                    }
                }
                account
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch account state, substituting zero state");
                AccountState::zero()
            }
        }
    }

    fn subscribe_books(&self) {
        for symbol in self.symbols() {
            match self.gateway.get_l2_snapshot(&symbol) {
                Ok(snapshot) => {
                    info!(%symbol, mid = ?snapshot.mid(), "seeded book");
                    self.books.update(snapshot);
                }
                Err(e) => warn!(%symbol, error = %e, "failed to seed book snapshot"),
            }

            let books = Arc::clone(&self.books);
            let recorder = self.recorder.clone();
            let sym = symbol.clone();
            let result = self.gateway.subscribe_l2(
                &symbol,
                Box::new(move |snapshot| {
                    books.update(snapshot);
                    if let Some(recorder) = &recorder {
                        if let Some(book) = books.get(&sym) {
                            recorder.lock().record_l2(&sym, &book);
                        }
                    }
                }),
            );
            if let Err(e) = result {
                warn!(%symbol, error = %e, "failed to subscribe L2");
            }
        }
    }

    fn subscribe_trades(&self) {
        for symbol in self.symbols() {
            let Some(recorder) = self.recorder.clone() else { continue };
            let sym = symbol.clone();
            let result = self.gateway.subscribe_trades(
                &symbol,
                Box::new(move |trade| recorder.lock().record_trade(&sym, &trade)),
            );
            if let Err(e) = result {
                warn!(%symbol, error = %e, "failed to subscribe trades");
            }
        }
    }

    fn subscribe_user_events(&self, address: &str) {
        let order_manager = Arc::clone(&self.order_manager);
        let strategy = Arc::clone(&self.strategy);
        if let Err(e) = self.gateway.subscribe_user_fills(
            address,
            Box::new(move |fill| {
                order_manager.on_fill(&fill);
                strategy.lock().on_fill(&fill);
            }),
        ) {
            warn!(error = %e, "failed to subscribe user fills");
        }

        let order_manager = Arc::clone(&self.order_manager);
        if let Err(e) = self.gateway.subscribe_order_updates(
            address,
            Box::new(move |updates: Vec<OrderUpdateEvent>| {
                order_manager.on_order_update(&updates, now_ms());
            }),
        ) {
            warn!(error = %e, "failed to subscribe order updates");
        }
    }

    fn install_signal_handler(&self) {
        let running = Arc::clone(&self.running);
        let wake_lock = Arc::clone(&self.wake_lock);
        let wake_cv = Arc::clone(&self.wake_cv);
        let result = ctrlc::set_handler(move || {
            info!("interrupt received, stopping");
            running.store(false, Ordering::SeqCst);
            let _guard = wake_lock.lock();
            wake_cv.notify_all();
        });
        if let Err(e) = result {
            warn!(error = %e, "failed to install signal handler (already installed?)");
        }
    }

    /// Cancel-all per symbol, stop the L4 client, close the recorder, and
    /// shut down the gateway. Each step is isolated from the others' failures.
    fn shutdown(&self) {
        info!("shutting down engine");
        self.strategy.lock().on_stop();

        let now = now_ms();
        for symbol in self.symbols() {
            if let Err(e) = self.order_manager.cancel_all(self.gateway.execution().as_ref(), &symbol, now) {
                error!(%symbol, error = %e, "error cancelling orders on shutdown");
            }
        }

        if let Some(l4_client) = &self.l4_client {
            l4_client.stop();
        }

        if let Some(recorder) = &self.recorder {
            recorder.lock().close();
            info!("data recorder closed");
        }

        self.gateway.shutdown();
        info!("engine stopped");
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

/// Converts through string formatting rather than pulling in a numeric-trait
/// dependency just for metrics gauges, which tolerate the precision loss.
fn decimal_to_f64(value: rust_decimal::Decimal) -> f64 {
    value.to_string().parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AccountState, DesiredOrder, L2BookSnapshot, Order, PriceLevel, StrategyDecision};
    use crate::execution::{paper::PaperExecutor, ExecutionBackend, PlaceOrderRequest, PlacementAck};
    use crate::gateway::{Gateway, MarketDataClient, SubscriptionId};
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;

    struct FakeMarketData {
        snapshot: L2BookSnapshot,
    }

    impl MarketDataClient for FakeMarketData {
        fn subscribe_l2(&self, _s: &Symbol, _cb: Box<dyn Fn(L2BookSnapshot) + Send>) -> anyhow::Result<SubscriptionId> {
            Ok(1)
        }
        fn subscribe_trades(&self, _s: &Symbol, _cb: Box<dyn Fn(serde_json::Value) + Send>) -> anyhow::Result<SubscriptionId> {
            Ok(2)
        }
        fn subscribe_user_fills(&self, _a: &str, _cb: Box<dyn Fn(Fill) + Send>) -> anyhow::Result<SubscriptionId> {
            Ok(3)
        }
        fn subscribe_order_updates(
            &self,
            _a: &str,
            _cb: Box<dyn Fn(Vec<OrderUpdateEvent>) + Send>,
        ) -> anyhow::Result<SubscriptionId> {
            Ok(4)
        }
        fn subscribe_bbo(&self, _s: &Symbol, _cb: Box<dyn Fn(L2BookSnapshot) + Send>) -> anyhow::Result<SubscriptionId> {
            Ok(5)
        }
        fn get_l2_snapshot(&self, _s: &Symbol) -> anyhow::Result<L2BookSnapshot> {
            Ok(self.snapshot.clone())
        }
        fn get_all_mids(&self) -> anyhow::Result<std::collections::HashMap<Symbol, rust_decimal::Decimal>> {
            Ok(Default::default())
        }
        fn get_meta(&self) -> anyhow::Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
        fn shutdown(&self) {}
    }

    struct CountingStrategy {
        on_tick_calls: AtomicUsize,
        decision: Option<StrategyDecision>,
    }

    impl Strategy for CountingStrategy {
        fn on_tick(
            &mut self,
            symbol: &Symbol,
            _book: Option<&L2BookSnapshot>,
            _account: &AccountState,
            _open_orders: &[Order],
        ) -> Option<StrategyDecision> {
            self.on_tick_calls.fetch_add(1, Ordering::SeqCst);
            self.decision.clone().map(|mut d| {
                d.symbol = symbol.clone();
                d
            })
        }
    }

    fn paper_config() -> Config {
        serde_json::from_str(r#"{"paper_mode": true, "trading": {"coins": ["BTC"]}, "tick_interval_s": 0.01}"#).unwrap()
    }

    fn make_engine(strategy: Box<dyn Strategy>) -> Engine {
        let books = Arc::new(BookStore::new());
        let snapshot = L2BookSnapshot::new(
            Symbol::from("BTC"),
            vec![PriceLevel::new(dec!(100), dec!(10), 1)],
            vec![PriceLevel::new(dec!(101), dec!(10), 1)],
            0,
        );
        let market_data = Arc::new(FakeMarketData { snapshot });
        let gateway = Arc::new(Gateway::create(&paper_config(), market_data, books.clone(), None).unwrap());
        Engine::new(paper_config(), gateway, books, strategy, None, None, None)
    }

    #[test]
    fn tick_invokes_strategy_once_per_symbol() {
        let engine = make_engine(Box::new(CountingStrategy { on_tick_calls: AtomicUsize::new(0), decision: None }));
        engine.tick();
        engine.tick();
        assert_eq!(engine.stats().ticks_completed, 2);
    }

    #[test]
    fn decision_with_orders_places_a_bulk_order() {
        let decision = StrategyDecision {
            symbol: Symbol::from("BTC"),
            desired_orders: vec![DesiredOrder::new(Side::Buy, dec!(100), dec!(0.01))],
            cancel_all_first: false,
        };
        let engine = make_engine(Box::new(CountingStrategy {
            on_tick_calls: AtomicUsize::new(0),
            decision: Some(decision),
        }));
        engine.tick();
        let open = engine.order_manager.get_open_orders(Some(&Symbol::from("BTC")));
        assert_eq!(open.len(), 1);
    }

    #[test]
    fn account_state_falls_back_to_zero_when_fetch_fails() {
        struct FailingBackend;
        impl ExecutionBackend for FailingBackend {
            fn place_order(&self, _s: &Symbol, _r: &PlaceOrderRequest) -> PlacementAck {
                PlacementAck::error("unused".into())
            }
            fn place_bulk_orders(&self, _s: &Symbol, _r: &[PlaceOrderRequest]) -> PlacementAck {
                PlacementAck { statuses: vec![] }
            }
            fn cancel_order(&self, _s: &Symbol, _id: u64) -> PlacementAck {
                PlacementAck::error("unused".into())
            }
            fn cancel_bulk(&self, _s: &Symbol, _ids: &[u64]) -> PlacementAck {
                PlacementAck { statuses: vec![] }
            }
            fn cancel_all(&self, _s: &Symbol) -> anyhow::Result<()> {
                Ok(())
            }
            fn get_open_orders(&self, _s: Option<&Symbol>) -> anyhow::Result<Vec<Order>> {
                Ok(vec![])
            }
            fn get_user_state(&self) -> anyhow::Result<AccountState> {
                anyhow::bail!("venue unreachable")
            }
            fn get_user_fills(&self) -> anyhow::Result<Vec<Fill>> {
                Ok(vec![])
            }
        }

        let books = Arc::new(BookStore::new());
        let market_data = Arc::new(FakeMarketData {
            snapshot: L2BookSnapshot::new(Symbol::from("BTC"), vec![], vec![], 0),
        });
        let gateway = Arc::new(Gateway::new(market_data, Arc::new(FailingBackend)));
        let engine = Engine::new(
            paper_config(),
            gateway,
            books,
            Box::new(CountingStrategy { on_tick_calls: AtomicUsize::new(0), decision: None }),
            None,
            None,
            None,
        );
        let account = engine.get_account_state();
        assert_eq!(account.account_value, rust_decimal::Decimal::ZERO);
    }

    #[test]
    fn paper_fills_are_applied_before_tick_reads_open_orders() {
        let books = Arc::new(BookStore::new());
        books.update(L2BookSnapshot::new(
            Symbol::from("BTC"),
            vec![PriceLevel::new(dec!(100), dec!(10), 1)],
            vec![PriceLevel::new(dec!(101), dec!(10), 1)],
            0,
        ));
        let paper = Arc::new(PaperExecutor::new(books.clone()));
        let market_data = Arc::new(FakeMarketData {
            snapshot: L2BookSnapshot::new(Symbol::from("BTC"), vec![], vec![], 0),
        });
        let gateway = Arc::new(Gateway::new(market_data, paper.clone() as Arc<dyn ExecutionBackend>));
        let symbol = Symbol::from("BTC");
        let engine = Engine::new(
            paper_config(),
            gateway,
            books.clone(),
            Box::new(CountingStrategy { on_tick_calls: AtomicUsize::new(0), decision: None }),
            None,
            None,
            None,
        );

        engine.order_manager.place_order(
            paper.as_ref(),
            &symbol,
            Side::Buy,
            dec!(101),
            dec!(0.1),
            OrderType::Limit,
            TimeInForce::Gtc,
            false,
            0,
        );
        engine.tick();

        let open = engine.order_manager.get_open_orders(Some(&symbol));
        assert!(open.is_empty(), "resting order should have filled against the book");
        assert_eq!(engine.stats().fills_processed, 1);
    }
}
