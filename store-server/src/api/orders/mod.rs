//! Orders API

pub mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::checkout).get(handler::list))
        .route("/{id}", get(handler::get_by_id).patch(handler::transition))
        .merge(super::tracking::router())
}
