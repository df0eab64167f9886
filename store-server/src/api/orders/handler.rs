//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::identity::{Caller, Owner};
use crate::core::ServerState;
use crate::db::repository::order;
use crate::orders;
use crate::utils::{AppError, AppResponse, AppResult, PaginationParams, ok};
use shared::order::{Actor, DeliveryInfo, Order, OrderDetail, OrderStatus, PaymentStatus};

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 500))]
    pub delivery_address: String,
    pub payment_method: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: OrderStatus,
    pub payment_status: Option<PaymentStatus>,
}

/// POST /api/orders - 结算下单
pub async fn checkout(
    State(state): State<ServerState>,
    Owner(owner): Owner,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<AppResponse<OrderDetail>>> {
    payload.validate()?;
    let info = DeliveryInfo {
        delivery_address: payload.delivery_address,
        payment_method: payload.payment_method,
        notes: payload.notes,
    };
    let detail = orders::checkout(
        state.db(),
        state.feed(),
        &owner,
        info,
        state.config.delivery_fee,
    )
    .await?;
    Ok(ok(detail))
}

/// GET /api/orders - 当前用户的订单列表 (支持状态筛选和分页)
pub async fn list(
    State(state): State<ServerState>,
    Owner(owner): Owner,
    Query(query): Query<ListQuery>,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<AppResponse<OrderPage>>> {
    let (limit, offset) = page.clamped();
    let (orders, has_more) =
        order::list_by_owner(state.db(), &owner.key(), query.status, limit, offset).await?;
    Ok(ok(OrderPage { orders, has_more }))
}

/// GET /api/orders/{id} - 订单详情 (含明细快照)
pub async fn get_by_id(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<i64>,
) -> AppResult<Json<AppResponse<OrderDetail>>> {
    let detail = order::find_detail(state.db(), id).await?;
    authorize_view(&detail.order, &actor)?;
    Ok(ok(detail))
}

/// PATCH /api/orders/{id} - 状态流转
///
/// 顾客仅能取消自己的订单；操作员可执行任意合法流转
pub async fn transition(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<i64>,
    Json(payload): Json<TransitionRequest>,
) -> AppResult<Json<AppResponse<Order>>> {
    let updated = orders::transition(
        state.db(),
        state.feed(),
        id,
        payload.status,
        &actor,
        payload.payment_status,
    )
    .await?;
    Ok(ok(updated))
}

/// Customers only see their own orders; operators see everything
pub(crate) fn authorize_view(order: &Order, actor: &Actor) -> Result<(), AppError> {
    match actor {
        Actor::Operator { .. } => Ok(()),
        Actor::Customer { owner } if order.owner == *owner => Ok(()),
        Actor::Customer { .. } => Err(AppError::not_found(format!("Order {}", order.id))),
    }
}
