//! Cart API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use validator::Validate;

use crate::api::identity::Owner;
use crate::core::ServerState;
use crate::db::repository::{cart, product};
use crate::utils::{AppError, AppResponse, AppResult, ok, ok_with_message};
use shared::models::{CartOwner, CartSnapshot};

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: i64,
    #[validate(range(min = 1, max = 999))]
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetQuantityRequest {
    #[validate(range(min = 0, max = 999))]
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MergeRequest {
    /// Anonymous session whose cart is folded into the user's
    #[validate(length(min = 1))]
    pub session_id: String,
}

/// GET /api/cart - 获取当前购物车
pub async fn view(
    State(state): State<ServerState>,
    Owner(owner): Owner,
) -> AppResult<Json<AppResponse<CartSnapshot>>> {
    let snapshot = cart::snapshot(state.db(), &owner).await?;
    Ok(ok(snapshot))
}

/// POST /api/cart/items - 添加商品
pub async fn add_item(
    State(state): State<ServerState>,
    Owner(owner): Owner,
    Json(payload): Json<AddItemRequest>,
) -> AppResult<Json<AppResponse<CartSnapshot>>> {
    payload.validate()?;
    // Reject dead references up front; stock is only checked at checkout
    product::find_by_id(state.db(), payload.product_id).await?;
    let snapshot = cart::add_item(state.db(), &owner, payload.product_id, payload.quantity).await?;
    Ok(ok(snapshot))
}

/// PUT /api/cart/items/{product_id} - 设置商品数量 (0 即移除)
pub async fn set_quantity(
    State(state): State<ServerState>,
    Owner(owner): Owner,
    Path(product_id): Path<i64>,
    Json(payload): Json<SetQuantityRequest>,
) -> AppResult<Json<AppResponse<CartSnapshot>>> {
    payload.validate()?;
    let snapshot = cart::set_quantity(state.db(), &owner, product_id, payload.quantity).await?;
    Ok(ok(snapshot))
}

/// DELETE /api/cart/items/{product_id} - 移除商品
pub async fn remove_item(
    State(state): State<ServerState>,
    Owner(owner): Owner,
    Path(product_id): Path<i64>,
) -> AppResult<Json<AppResponse<CartSnapshot>>> {
    let snapshot = cart::remove_item(state.db(), &owner, product_id).await?;
    Ok(ok(snapshot))
}

/// DELETE /api/cart - 清空购物车
pub async fn clear(
    State(state): State<ServerState>,
    Owner(owner): Owner,
) -> AppResult<Json<AppResponse<()>>> {
    cart::clear(state.db(), &owner).await?;
    Ok(ok_with_message((), "Cart cleared"))
}

/// POST /api/cart/merge - 登录时合并匿名购物车
///
/// 幂等：重复调用时来源购物车已清空，不会重复累加
pub async fn merge(
    State(state): State<ServerState>,
    Owner(owner): Owner,
    Json(payload): Json<MergeRequest>,
) -> AppResult<Json<AppResponse<CartSnapshot>>> {
    payload.validate()?;
    if !matches!(owner, CartOwner::User(_)) {
        return Err(AppError::invalid(
            "Cart merge requires an authenticated user",
        ));
    }
    let session = CartOwner::Session(payload.session_id);
    let snapshot = cart::merge(state.db(), &owner, &session).await?;
    Ok(ok(snapshot))
}
