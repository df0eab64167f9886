//! Cart API

pub mod handler;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::view).delete(handler::clear))
        .route("/items", post(handler::add_item))
        .route(
            "/items/{product_id}",
            put(handler::set_quantity).delete(handler::remove_item),
        )
        .route("/merge", post(handler::merge))
}
