//! Shared types for the storefront
//!
//! Common types used by the store server and its clients: catalog and
//! cart models, the order/tracking domain, realtime feed messages, and
//! ID/time utilities.

pub mod message;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Feed re-exports (for convenient access)
pub use message::{FeedMessage, FeedPayload};
