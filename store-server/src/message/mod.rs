//! Realtime Feed Module
//!
//! Fan-out of order and tracking messages to connected viewers.

mod feed;

pub use feed::OrderFeed;
