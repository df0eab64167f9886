//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`cart`] - 购物车接口
//! - [`orders`] - 订单接口 (结算、查询、状态流转)
//! - [`tracking`] - 配送跟踪接口 (视图、补发、实时流)
//!
//! Caller identity arrives in headers resolved by an upstream gateway;
//! see [`identity`] for the extractors.

pub mod identity;

pub mod cart;
pub mod health;
pub mod orders;
pub mod tracking;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};

/// Assemble the full API router
pub fn router() -> Router<ServerState> {
    Router::new()
        .nest("/api/health", health::router())
        .nest("/api/cart", cart::router())
        .nest("/api/orders", orders::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
