//! Order domain types
//!
//! - **status**: order status state machine and tracking status mapping
//! - **event**: append-only delivery tracking events
//! - **types**: order, order item and tracking view models

pub mod event;
pub mod status;
pub mod types;

pub use event::TrackingEvent;
pub use status::{OrderStatus, PaymentStatus, TrackingStatus};
pub use types::{Actor, DeliveryInfo, Order, OrderDetail, OrderItem, TrackingView};
