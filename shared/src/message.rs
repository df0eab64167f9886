//! Realtime feed messages
//!
//! These types are shared between the store server and its viewers
//! (customer tracking page, admin dashboard). The feed is a best-effort
//! fan-out: viewers that miss messages recover by re-reading the
//! tracking log, which remains the source of truth.

use serde::{Deserialize, Serialize};

use crate::order::{Order, TrackingEvent};
use crate::util::now_millis;

/// Feed payload variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedPayload {
    /// A checkout produced a new order
    OrderCreated { order: Order },
    /// An order's status (or payment status) changed
    OrderUpdated { order: Order },
    /// A tracking event was appended to the log
    TrackingAppended { event: TrackingEvent },
}

/// One message on the realtime feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedMessage {
    /// Order the message concerns
    pub order_id: i64,
    /// Server publish timestamp (Unix milliseconds)
    pub timestamp: i64,
    pub payload: FeedPayload,
}

impl FeedMessage {
    pub fn order_created(order: Order) -> Self {
        Self {
            order_id: order.id,
            timestamp: now_millis(),
            payload: FeedPayload::OrderCreated { order },
        }
    }

    pub fn order_updated(order: Order) -> Self {
        Self {
            order_id: order.id,
            timestamp: now_millis(),
            payload: FeedPayload::OrderUpdated { order },
        }
    }

    pub fn tracking_appended(event: TrackingEvent) -> Self {
        Self {
            order_id: event.order_id,
            timestamp: now_millis(),
            payload: FeedPayload::TrackingAppended { event },
        }
    }
}
