//! Order status state machine and tracking status mapping
//!
//! `OrderStatus` is the constrained lifecycle of an order. Forward
//! transitions follow the linear sequence; `Cancelled` is reachable only
//! before the order goes out for delivery. `TrackingStatus` is the
//! customer-facing delivery status written to the tracking log; the two
//! are kept in lockstep by the lifecycle service, which writes both in
//! one transaction.

use serde::{Deserialize, Serialize};

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Delivering,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Next status in the forward sequence, if any
    pub fn next(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Preparing),
            OrderStatus::Preparing => Some(OrderStatus::Delivering),
            OrderStatus::Delivering => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    /// Terminal statuses admit no further transition
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Cancellation is legal until the order is out for delivery
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Preparing
        )
    }

    /// Transition legality: one step forward, or cancellation from a
    /// cancellable status. Skipping states is rejected.
    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        if target == OrderStatus::Cancelled {
            return self.is_cancellable();
        }
        self.next() == Some(target)
    }

    /// Tracking status recorded when an order enters this status
    pub fn tracking_status(self) -> TrackingStatus {
        match self {
            OrderStatus::Pending => TrackingStatus::OrderPlaced,
            OrderStatus::Confirmed => TrackingStatus::OrderConfirmed,
            OrderStatus::Preparing => TrackingStatus::Preparing,
            OrderStatus::Delivering => TrackingStatus::OutForDelivery,
            OrderStatus::Delivered => TrackingStatus::Delivered,
            OrderStatus::Cancelled => TrackingStatus::Cancelled,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Delivering => "delivering",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Payment status carried on the order
///
/// Settlement itself is an external concern; the core only records the
/// state reported by the payment collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Delivery tracking status, as written to the append-only log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    OrderPlaced,
    OrderConfirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl TrackingStatus {
    /// Fixed progress percentage shown on the tracking view
    pub fn progress(self) -> u8 {
        match self {
            TrackingStatus::OrderPlaced => 20,
            TrackingStatus::OrderConfirmed => 30,
            TrackingStatus::Preparing => 50,
            TrackingStatus::OutForDelivery => 80,
            TrackingStatus::Delivered => 100,
            TrackingStatus::Cancelled => 0,
        }
    }

    /// Order status implied by a courier-reported tracking status, if any.
    ///
    /// Location pings and notes carry a status the order is already in;
    /// only these two advance the order itself.
    pub fn implied_order_status(self) -> Option<OrderStatus> {
        match self {
            TrackingStatus::OutForDelivery => Some(OrderStatus::Delivering),
            TrackingStatus::Delivered => Some(OrderStatus::Delivered),
            _ => None,
        }
    }
}

impl std::fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrackingStatus::OrderPlaced => "order_placed",
            TrackingStatus::OrderConfirmed => "order_confirmed",
            TrackingStatus::Preparing => "preparing",
            TrackingStatus::OutForDelivery => "out_for_delivery",
            TrackingStatus::Delivered => "delivered",
            TrackingStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}
