//! Orders Module
//!
//! The domain core: the checkout transaction that turns a cart into an
//! order, and the lifecycle state machine that drives an order from
//! `pending` to `delivered` (or `cancelled`, with stock restitution).

pub mod checkout;
pub mod error;
pub mod lifecycle;

pub use checkout::checkout;
pub use error::{OrderError, OrderResult};
pub use lifecycle::{TrackingUpdate, record_tracking, transition};
