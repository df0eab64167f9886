//! Health Check API

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::utils::{AppResponse, AppResult, ok};
use shared::util::now_millis;

pub fn router() -> Router<ServerState> {
    Router::new().route("/", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: i64,
}

/// GET /api/health - 健康检查 (含数据库连通性)
async fn health(State(state): State<ServerState>) -> AppResult<Json<AppResponse<HealthStatus>>> {
    // A failing pool turns the health check red before traffic notices
    sqlx::query("SELECT 1")
        .execute(state.db())
        .await
        .map_err(|e| crate::utils::AppError::database(e.to_string()))?;

    Ok(ok(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: now_millis(),
    }))
}
