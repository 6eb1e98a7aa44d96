//! L4 client: owns the connection lifecycle around an [`L4Maintainer`] —
//! ingest loop, keep-alive pings, fixed-delay reconnect, and queued
//! subscriptions sent once the socket is open.
//!
//! Grounded on the original `l4_client.py`'s `L4Client(threading.Thread)`:
//! one reader thread per connection, a second daemon thread pinging every 30
//! seconds, and a fixed 5-second reconnect delay with no backoff. The actual
//! socket framing is out of scope (per §1's transport exclusion) — this
//! module depends only on the [`L4Transport`] seam below, so the thread
//! model itself can be exercised without a real websocket.

use super::L4Maintainer;
use crate::core::Symbol;
use anyhow::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// One message read off the L4 websocket: either a raw payload tagged with
/// its symbol, or a connection-lifecycle event.
pub enum L4Event {
    /// `channel: "l4Book"` payload for `symbol`.
    Message { symbol: Symbol, payload: serde_json::Value },
    /// The socket closed or errored; the client will reconnect.
    Closed,
}

/// What the L4 client needs from the websocket transport.
///
/// `connect` blocks until the socket is open or fails; `recv` blocks until
/// the next message or a close/error (returning [`L4Event::Closed`]); `send`
/// writes one frame. A real implementation wraps a websocket handle; tests
/// use an in-memory fake.
pub trait L4Transport: Send + Sync {
    fn connect(&self, url: &str) -> Result<()>;
    fn recv(&self) -> Result<L4Event>;
    fn send_subscribe(&self, symbol: &Symbol) -> Result<()>;
    fn send_ping(&self) -> Result<()>;
    fn close(&self);
}

/// Owns the reconnect loop for one L4 websocket connection.
pub struct L4Client<T: L4Transport + 'static> {
    transport: Arc<T>,
    server_url: String,
    reconnect_delay: Duration,
    maintainer: Arc<L4Maintainer>,
    stopped: Arc<AtomicBool>,
    queued_subscriptions: Mutex<Vec<Symbol>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<T: L4Transport + 'static> L4Client<T> {
    pub fn new(server_url: impl Into<String>, transport: Arc<T>, maintainer: Arc<L4Maintainer>) -> Self {
        Self {
            transport,
            server_url: server_url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            maintainer,
            stopped: Arc::new(AtomicBool::new(false)),
            queued_subscriptions: Mutex::new(Vec::new()),
            handle: Mutex::new(None),
        }
    }

    #[cfg(test)]
    fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Start the ingest thread. Queued subscriptions (registered via
    /// [`Self::subscribe`] before or after `start`) are replayed on connect.
    pub fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("l4-client".into())
            .spawn(move || this.run())
            .expect("spawning l4 client thread");
        *self.handle.lock() = Some(handle);
    }

    /// Stop the client. Idempotent; blocks until the ingest thread exits.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.transport.close();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }

    /// Register interest in `symbol`. Sent immediately if the socket is
    /// already connected (the run loop owns "is connected", so this just
    /// queues — the loop drains the queue right after every successful
    /// connect, and also opportunistically whenever queued while running).
    pub fn subscribe(&self, symbol: Symbol) {
        self.queued_subscriptions.lock().push(symbol);
    }

    fn run(&self) {
        while !self.stopped.load(Ordering::SeqCst) {
            match self.transport.connect(&self.server_url) {
                Ok(()) => {
                    info!(url = %self.server_url, "L4 websocket connected");
                    self.maintainer.reset();
                    self.flush_queued_subscriptions();
                    self.ping_loop_and_ingest();
                }
                Err(e) => {
                    error!(error = %e, "L4 websocket connection failed");
                }
            }

            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            info!(delay_s = self.reconnect_delay.as_secs(), "L4 reconnecting");
            thread::sleep(self.reconnect_delay);
        }
    }

    fn flush_queued_subscriptions(&self) {
        let symbols: Vec<Symbol> = self.queued_subscriptions.lock().clone();
        for symbol in symbols {
            if let Err(e) = self.transport.send_subscribe(&symbol) {
                warn!(%symbol, error = %e, "failed to send L4 subscribe");
            }
        }
    }

    /// Spawns the ping thread for this connection and reads messages until
    /// the socket closes or the client is asked to stop.
    fn ping_loop_and_ingest(&self) {
        let ping_transport = Arc::clone(&self.transport);
        let ping_stopped = Arc::clone(&self.stopped);
        let ping_handle = thread::Builder::new()
            .name("l4-ping".into())
            .spawn(move || {
                while !ping_stopped.load(Ordering::SeqCst) {
                    thread::sleep(PING_INTERVAL);
                    if ping_stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    if ping_transport.send_ping().is_err() {
                        break;
                    }
                }
            })
            .expect("spawning l4 ping thread");

        loop {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            match self.transport.recv() {
                Ok(L4Event::Message { symbol, payload }) => {
                    self.maintainer.apply(&symbol, &payload);
                }
                Ok(L4Event::Closed) => {
                    info!("L4 websocket closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "L4 websocket read error");
                    break;
                }
            }
        }

        let _ = ping_handle.join();
    }
}

/// Object-safe handle over [`L4Client`], so callers that don't want to be
/// generic over the transport type can hold `Arc<dyn L4ClientHandle>`.
pub trait L4ClientHandle: Send + Sync {
    fn start(&self);
    fn stop(&self);
    fn subscribe(&self, symbol: Symbol);
}

impl<T: L4Transport + 'static> L4ClientHandle for Arc<L4Client<T>> {
    fn start(&self) {
        L4Client::start(self)
    }
    fn stop(&self) {
        L4Client::stop(self)
    }
    fn subscribe(&self, symbol: Symbol) {
        L4Client::subscribe(self, symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    struct FakeTransport {
        events: Mutex<VecDeque<L4Event>>,
        connect_calls: AtomicUsize,
        subscribe_calls: Mutex<Vec<Symbol>>,
    }

    impl L4Transport for FakeTransport {
        fn connect(&self, _url: &str) -> Result<()> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn recv(&self) -> Result<L4Event> {
            let mut events = self.events.lock();
            Ok(events.pop_front().unwrap_or(L4Event::Closed))
        }
        fn send_subscribe(&self, symbol: &Symbol) -> Result<()> {
            self.subscribe_calls.lock().push(symbol.clone());
            Ok(())
        }
        fn send_ping(&self) -> Result<()> {
            Ok(())
        }
        fn close(&self) {}
    }

    #[test]
    fn queued_subscriptions_are_sent_after_connect() {
        let transport = Arc::new(FakeTransport {
            events: Mutex::new(VecDeque::from([L4Event::Closed])),
            connect_calls: AtomicUsize::new(0),
            subscribe_calls: Mutex::new(Vec::new()),
        });
        let maintainer = Arc::new(L4Maintainer::new());
        let client = Arc::new(
            L4Client::new("ws://fake", transport.clone(), maintainer)
                .with_reconnect_delay(Duration::from_millis(1)),
        );
        client.subscribe(Symbol::from("BTC"));
        client.start();
        std::thread::sleep(Duration::from_millis(20));
        client.stop();

        assert!(transport.subscribe_calls.lock().contains(&Symbol::from("BTC")));
    }

    #[test]
    fn messages_are_folded_into_the_maintainer() {
        let transport = Arc::new(FakeTransport {
            events: Mutex::new(VecDeque::from([
                L4Event::Message {
                    symbol: Symbol::from("BTC"),
                    payload: serde_json::json!({"bids": [{"oid": 1, "user": "0xa", "px": "100", "sz": "1"}], "asks": []}),
                },
                L4Event::Closed,
            ])),
            connect_calls: AtomicUsize::new(0),
            subscribe_calls: Mutex::new(Vec::new()),
        });
        let maintainer = Arc::new(L4Maintainer::new());
        let client = Arc::new(
            L4Client::new("ws://fake", transport, maintainer.clone()).with_reconnect_delay(Duration::from_secs(30)),
        );
        client.start();
        std::thread::sleep(Duration::from_millis(20));
        client.stop();

        let book = maintainer.get(&Symbol::from("BTC")).unwrap();
        assert_eq!(book.best_bid(), Some(rust_decimal::Decimal::new(100, 0)));
    }
}
