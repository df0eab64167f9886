//! Order, order item and tracking view models

use serde::{Deserialize, Serialize};

use super::event::TrackingEvent;
use super::status::{OrderStatus, PaymentStatus, TrackingStatus};

/// Order entity - created atomically with its items at checkout
///
/// Monetary fields and item prices are frozen at checkout time and never
/// recomputed from the live catalog. Orders are never deleted;
/// cancellation is a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    /// Opaque owner key (`user:<id>` or `session:<token>`)
    pub owner: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    /// Sum of item line totals, minor units, frozen at checkout
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub total_amount: i64,
    pub delivery_address: String,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Order line - immutable price snapshot taken at checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    /// Product name snapshot (catalog renames don't rewrite history)
    pub name: String,
    pub quantity: i64,
    /// Unit price snapshot, minor units
    pub unit_price: i64,
    pub total_price: i64,
}

/// Order with its item snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Delivery details captured at checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub delivery_address: String,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

/// Who is requesting an order mutation
///
/// Customers may only cancel their own orders; operators may drive any
/// legal transition. Resolution of the actor from credentials happens
/// outside the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Actor {
    /// Order owner, identified by the same opaque owner key as the order
    Customer { owner: String },
    /// Fulfillment operator (admin console, courier app)
    Operator { id: String },
}

impl Actor {
    pub fn is_operator(&self) -> bool {
        matches!(self, Actor::Operator { .. })
    }
}

/// Aggregated tracking view for one order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingView {
    pub order_id: i64,
    /// Status of the most recent tracking event
    pub current_status: Option<TrackingStatus>,
    /// Fixed progress percentage for `current_status` (0 when unknown)
    pub progress: u8,
    pub estimated_time: Option<i64>,
    /// Full history in append order
    pub tracking_history: Vec<TrackingEvent>,
}

impl TrackingView {
    /// Derive the view from the log. `current_status` is the status of
    /// the last event; the estimated time is the latest one recorded.
    pub fn from_history(order_id: i64, tracking_history: Vec<TrackingEvent>) -> Self {
        let current_status = tracking_history.last().map(|e| e.status);
        let progress = current_status.map(|s| s.progress()).unwrap_or(0);
        let estimated_time = tracking_history
            .iter()
            .rev()
            .find_map(|e| e.estimated_time);
        Self {
            order_id,
            current_status,
            progress,
            estimated_time,
            tracking_history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_view_reads_latest_event() {
        let mut placed = TrackingEvent::new(1, TrackingStatus::OrderPlaced);
        placed.estimated_time = Some(1_000);
        let confirmed = TrackingEvent::new(1, TrackingStatus::OrderConfirmed);

        let view = TrackingView::from_history(1, vec![placed, confirmed]);
        assert_eq!(view.current_status, Some(TrackingStatus::OrderConfirmed));
        assert_eq!(view.progress, 30);
        // ETA 取最近一次记录的值
        assert_eq!(view.estimated_time, Some(1_000));
    }

    #[test]
    fn tracking_view_of_empty_history() {
        let view = TrackingView::from_history(1, vec![]);
        assert_eq!(view.current_status, None);
        assert_eq!(view.progress, 0);
    }
}
