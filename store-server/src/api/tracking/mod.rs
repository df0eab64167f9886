//! Delivery Tracking API
//!
//! Merged into the orders router under `/{id}/tracking`.

pub mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/{id}/tracking", get(handler::view).post(handler::record))
        .route("/{id}/tracking/events", get(handler::events))
        .route("/{id}/tracking/stream", get(handler::stream))
}
