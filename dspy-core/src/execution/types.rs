use crate::core::{OrderType, Side, TimeInForce};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single order placement request, as handed to an [`super::ExecutionBackend`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub client_id: u64,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
}

/// One element of a [`PlacementAck`]'s `statuses` array.
///
/// This is the entire contract between an execution backend and the order
/// manager — the order manager interprets nothing else from a backend's
/// response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlacementStatus {
    /// Resting on the book, unfilled.
    Resting { venue_order_id: u64 },
    /// Crossed and filled immediately on placement.
    Filled { venue_order_id: u64 },
    /// Rejected by the venue (or, for cancels, the attempted operation).
    Error { message: String },
}

/// Structured acknowledgement returned by every [`super::ExecutionBackend`]
/// operation. `statuses` is ordered and positionally aligned with the
/// request's order(s) (one element per order for placements/cancels).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementAck {
    pub statuses: Vec<PlacementStatus>,
}

impl PlacementAck {
    pub fn single(status: PlacementStatus) -> Self {
        Self {
            statuses: vec![status],
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::single(PlacementStatus::Error {
            message: message.into(),
        })
    }
}
