//! Order manager: owns every order placed by this process.
//!
//! Correlates the client id this process assigns at placement time with the
//! venue id learned from the placement response, and absorbs asynchronous
//! fill/status events arriving on a different thread.
//!
//! ## Concurrency
//!
//! A single mutex guards the client-id map, the venue-id reverse map, and the
//! client-id counter. All mutations happen inside the critical section, but
//! network calls happen outside it: the order is inserted first (locked), the
//! backend is called unlocked, then the response is applied (locked). A fill
//! callback racing the placement call will either miss the order (not yet
//! inserted — impossible, since insert happens before the call returns control
//! to the caller) or find it by client id via the backend's own echo and by
//! venue id the instant the response is applied.

use crate::core::{Fill, Order, OrderStatus, OrderType, Side, Symbol, TimeInForce};
use crate::execution::{ExecutionBackend, PlaceOrderRequest, PlacementAck, PlacementStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::warn;

/// An order-status push from the venue's order-updates channel.
#[derive(Debug, Clone)]
pub struct OrderUpdateEvent {
    pub venue_order_id: u64,
    /// Venue's own string tag: `"canceled"`, `"filled"`, `"rejected"`, or
    /// anything else (ignored).
    pub status_tag: String,
}

struct Inner {
    next_client_id: u64,
    orders: HashMap<u64, Order>,
    venue_to_client: HashMap<u64, u64>,
}

pub struct OrderManager {
    inner: Mutex<Inner>,
}

impl Default for OrderManager {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_client_id: 1,
                orders: HashMap::new(),
                venue_to_client: HashMap::new(),
            }),
        }
    }

    /// Place a single order. Generates a fresh client id, tracks it as
    /// `Pending`, calls the backend, then applies the response.
    #[allow(clippy::too_many_arguments)]
    pub fn place_order(
        &self,
        backend: &dyn ExecutionBackend,
        symbol: &Symbol,
        side: Side,
        price: rust_decimal::Decimal,
        size: rust_decimal::Decimal,
        order_type: OrderType,
        time_in_force: TimeInForce,
        reduce_only: bool,
        now_ms: i64,
    ) -> Order {
        let (client_id, request) = {
            let mut inner = self.inner.lock();
            let client_id = inner.next_client_id;
            inner.next_client_id += 1;
            let order = Order {
                client_id,
                venue_order_id: None,
                symbol: symbol.clone(),
                side,
                price,
                size,
                order_type,
                time_in_force,
                reduce_only,
                status: OrderStatus::Pending,
                filled_size: rust_decimal::Decimal::ZERO,
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            };
            inner.orders.insert(client_id, order);
            (
                client_id,
                PlaceOrderRequest {
                    client_id,
                    side,
                    price,
                    size,
                    order_type,
                    time_in_force,
                    reduce_only,
                },
            )
        };

        let ack = backend.place_order(symbol, &request);

        let mut inner = self.inner.lock();
        apply_ack(&mut inner, &[client_id], &ack, now_ms);
        inner.orders.get(&client_id).cloned().expect("just inserted")
    }

    /// Place a batch of desired orders for `symbol` as one backend call.
    /// Insertion happens before the call so a concurrent fill callback can
    /// still correlate by client id.
    pub fn place_bulk(
        &self,
        backend: &dyn ExecutionBackend,
        symbol: &Symbol,
        desired: &[crate::core::DesiredOrder],
        now_ms: i64,
    ) -> Vec<Order> {
        let (client_ids, requests) = {
            let mut inner = self.inner.lock();
            let mut client_ids = Vec::with_capacity(desired.len());
            let mut requests = Vec::with_capacity(desired.len());
            for d in desired {
                let client_id = inner.next_client_id;
                inner.next_client_id += 1;
                let order = Order {
                    client_id,
                    venue_order_id: None,
                    symbol: symbol.clone(),
                    side: d.side,
                    price: d.price,
                    size: d.size,
                    order_type: d.order_type,
                    time_in_force: TimeInForce::Gtc,
                    reduce_only: d.reduce_only,
                    status: OrderStatus::Pending,
                    filled_size: rust_decimal::Decimal::ZERO,
                    created_at_ms: now_ms,
                    updated_at_ms: now_ms,
                };
                inner.orders.insert(client_id, order);
                client_ids.push(client_id);
                requests.push(PlaceOrderRequest {
                    client_id,
                    side: d.side,
                    price: d.price,
                    size: d.size,
                    order_type: d.order_type,
                    time_in_force: TimeInForce::Gtc,
                    reduce_only: d.reduce_only,
                });
            }
            (client_ids, requests)
        };

        let ack = backend.place_bulk_orders(symbol, &requests);

        let mut inner = self.inner.lock();
        apply_ack(&mut inner, &client_ids, &ack, now_ms);
        client_ids
            .iter()
            .filter_map(|id| inner.orders.get(id).cloned())
            .collect()
    }

    /// Cancel every order on `symbol` at the backend, then mark every
    /// non-terminal tracked order for that symbol `Cancelled`.
    pub fn cancel_all(&self, backend: &dyn ExecutionBackend, symbol: &Symbol, now_ms: i64) -> anyhow::Result<()> {
        backend.cancel_all(symbol)?;
        let mut inner = self.inner.lock();
        for order in inner.orders.values_mut() {
            if &order.symbol == symbol && !order.is_terminal() {
                order.status = OrderStatus::Cancelled;
                order.updated_at_ms = now_ms;
            }
        }
        Ok(())
    }

    /// Non-terminal tracked orders, optionally filtered to one symbol.
    pub fn get_open_orders(&self, symbol: Option<&Symbol>) -> Vec<Order> {
        self.inner
            .lock()
            .orders
            .values()
            .filter(|o| !o.is_terminal())
            .filter(|o| symbol.map(|s| &o.symbol == s).unwrap_or(true))
            .cloned()
            .collect()
    }

    /// Remove terminal orders whose `updated_at_ms` is older than `max_age_ms`,
    /// dropping their venue-id reverse mapping too.
    pub fn cleanup_terminal(&self, max_age_ms: i64, now_ms: i64) {
        let mut inner = self.inner.lock();
        let cutoff = now_ms - max_age_ms;
        let expired: Vec<u64> = inner
            .orders
            .values()
            .filter(|o| o.is_terminal() && o.updated_at_ms < cutoff)
            .map(|o| o.client_id)
            .collect();
        for client_id in expired {
            inner.orders.remove(&client_id);
            inner.venue_to_client.retain(|_, cid| *cid != client_id);
        }
    }

    /// Absorb a fill. Dropped silently if its venue id is not tracked — the
    /// same fill is reflected in the placement response when that response
    /// resolves after the websocket delivers it; when the backend response
    /// wins the race, this path is exercised.
    pub fn on_fill(&self, fill: &Fill) {
        let mut inner = self.inner.lock();
        let client_id = match inner.venue_to_client.get(&fill.venue_order_id).copied() {
            Some(id) => id,
            None => {
                warn!(venue_order_id = fill.venue_order_id, "fill for unknown venue id dropped");
                return;
            }
        };
        if let Some(order) = inner.orders.get_mut(&client_id) {
            order.filled_size += fill.size;
            order.updated_at_ms = fill.timestamp_ms;
            order.status = if order.filled_size >= order.size {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };
        }
    }

    /// Absorb a batch of order-status pushes. Unknown venue ids and unknown
    /// status tags are both ignored.
    pub fn on_order_update(&self, updates: &[OrderUpdateEvent], now_ms: i64) {
        let mut inner = self.inner.lock();
        for update in updates {
            let Some(&client_id) = inner.venue_to_client.get(&update.venue_order_id) else {
                continue;
            };
            let new_status = match update.status_tag.as_str() {
                "canceled" | "cancelled" => OrderStatus::Cancelled,
                "filled" => OrderStatus::Filled,
                "rejected" => OrderStatus::Rejected,
                _ => continue,
            };
            if let Some(order) = inner.orders.get_mut(&client_id) {
                order.status = new_status;
                order.updated_at_ms = now_ms;
            }
        }
    }
}

/// Positionally align `client_ids` with `ack.statuses` and apply each.
fn apply_ack(inner: &mut Inner, client_ids: &[u64], ack: &PlacementAck, now_ms: i64) {
    for (client_id, status) in client_ids.iter().zip(ack.statuses.iter()) {
        let Some(order) = inner.orders.get_mut(client_id) else {
            continue;
        };
        match status {
            PlacementStatus::Resting { venue_order_id } => {
                order.venue_order_id = Some(*venue_order_id);
                order.status = OrderStatus::Open;
                inner.venue_to_client.insert(*venue_order_id, *client_id);
            }
            PlacementStatus::Filled { venue_order_id } => {
                order.venue_order_id = Some(*venue_order_id);
                order.status = OrderStatus::Filled;
                order.filled_size = order.size;
                inner.venue_to_client.insert(*venue_order_id, *client_id);
            }
            PlacementStatus::Error { .. } => {
                order.status = OrderStatus::Rejected;
            }
        }
        order.updated_at_ms = now_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AccountState;
    use rust_decimal_macros::dec;

    struct FakeBackend {
        next_ack: Mutex<PlacementAck>,
    }

    impl FakeBackend {
        fn resting(oid: u64) -> Self {
            Self {
                next_ack: Mutex::new(PlacementAck::single(PlacementStatus::Resting { venue_order_id: oid })),
            }
        }
    }

    impl ExecutionBackend for FakeBackend {
        fn place_order(&self, _symbol: &Symbol, _request: &PlaceOrderRequest) -> PlacementAck {
            self.next_ack.lock().clone()
        }
        fn place_bulk_orders(&self, _symbol: &Symbol, _requests: &[PlaceOrderRequest]) -> PlacementAck {
            self.next_ack.lock().clone()
        }
        fn cancel_order(&self, _symbol: &Symbol, venue_order_id: u64) -> PlacementAck {
            PlacementAck::single(PlacementStatus::Resting { venue_order_id })
        }
        fn cancel_bulk(&self, _symbol: &Symbol, _venue_order_ids: &[u64]) -> PlacementAck {
            PlacementAck { statuses: vec![] }
        }
        fn cancel_all(&self, _symbol: &Symbol) -> anyhow::Result<()> {
            Ok(())
        }
        fn get_open_orders(&self, _symbol: Option<&Symbol>) -> anyhow::Result<Vec<Order>> {
            Ok(vec![])
        }
        fn get_user_state(&self) -> anyhow::Result<AccountState> {
            Ok(AccountState::zero())
        }
        fn get_user_fills(&self) -> anyhow::Result<Vec<Fill>> {
            Ok(vec![])
        }
    }

    #[test]
    fn place_then_fill_fully() {
        let backend = FakeBackend::resting(100);
        let manager = OrderManager::new();
        let symbol = Symbol::from("BTC");
        let order = manager.place_order(
            &backend,
            &symbol,
            Side::Buy,
            dec!(67500),
            dec!(0.1),
            OrderType::Limit,
            TimeInForce::Gtc,
            false,
            0,
        );
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.venue_order_id, Some(100));

        manager.on_fill(&Fill {
            symbol: symbol.clone(),
            side: Side::Buy,
            price: dec!(67500),
            size: dec!(0.1),
            venue_order_id: 100,
            fee: dec!(0),
            timestamp_ms: 1,
            closed_pnl: dec!(0),
            crossed: false,
        });

        let open = manager.get_open_orders(Some(&symbol));
        assert!(open.is_empty());
    }

    #[test]
    fn partial_fill_then_full_fill() {
        let backend = FakeBackend::resting(100);
        let manager = OrderManager::new();
        let symbol = Symbol::from("BTC");
        manager.place_order(
            &backend,
            &symbol,
            Side::Buy,
            dec!(67500),
            dec!(0.1),
            OrderType::Limit,
            TimeInForce::Gtc,
            false,
            0,
        );

        manager.on_fill(&Fill {
            symbol: symbol.clone(),
            side: Side::Buy,
            price: dec!(67500),
            size: dec!(0.05),
            venue_order_id: 100,
            fee: dec!(0),
            timestamp_ms: 1,
            closed_pnl: dec!(0),
            crossed: false,
        });
        let open = manager.get_open_orders(Some(&symbol));
        assert_eq!(open[0].status, OrderStatus::PartiallyFilled);
        assert_eq!(open[0].remaining_size(), dec!(0.05));

        manager.on_fill(&Fill {
            symbol: symbol.clone(),
            side: Side::Buy,
            price: dec!(67500),
            size: dec!(0.05),
            venue_order_id: 100,
            fee: dec!(0),
            timestamp_ms: 2,
            closed_pnl: dec!(0),
            crossed: false,
        });
        assert!(manager.get_open_orders(Some(&symbol)).is_empty());
    }

    #[test]
    fn unknown_venue_id_fill_is_dropped() {
        let manager = OrderManager::new();
        manager.on_fill(&Fill {
            symbol: Symbol::from("BTC"),
            side: Side::Buy,
            price: dec!(1),
            size: dec!(1),
            venue_order_id: 999,
            fee: dec!(0),
            timestamp_ms: 0,
            closed_pnl: dec!(0),
            crossed: false,
        });
        assert!(manager.get_open_orders(None).is_empty());
    }

    #[test]
    fn cancel_all_marks_non_terminal_orders_cancelled() {
        let backend = FakeBackend::resting(1);
        let manager = OrderManager::new();
        let symbol = Symbol::from("BTC");
        manager.place_order(
            &backend,
            &symbol,
            Side::Buy,
            dec!(1),
            dec!(1),
            OrderType::Limit,
            TimeInForce::Gtc,
            false,
            0,
        );
        manager.cancel_all(&backend, &symbol, 10).unwrap();
        assert!(manager.get_open_orders(Some(&symbol)).is_empty());
    }

    #[test]
    fn cancel_all_on_symbol_with_no_orders_is_a_noop() {
        let backend = FakeBackend::resting(1);
        let manager = OrderManager::new();
        assert!(manager.cancel_all(&backend, &Symbol::from("ETH"), 0).is_ok());
    }

    #[test]
    fn cleanup_terminal_zero_drops_all_terminal_orders() {
        let backend = FakeBackend {
            next_ack: Mutex::new(PlacementAck::single(PlacementStatus::Error {
                message: "no".into(),
            })),
        };
        let manager = OrderManager::new();
        let symbol = Symbol::from("BTC");
        manager.place_order(
            &backend,
            &symbol,
            Side::Buy,
            dec!(1),
            dec!(1),
            OrderType::Limit,
            TimeInForce::Gtc,
            false,
            0,
        );
        manager.cleanup_terminal(0, 1);
        assert_eq!(manager.inner.lock().orders.len(), 0);
    }
}
