//! Tracking API Handlers
//!
//! The read side serves the log (view + resync); the write side is the
//! courier update; the stream side bridges the realtime feed onto SSE.
//! A reconnecting viewer passes `after=<last seen event id>` and gets
//! the missed suffix of the log before live messages; delivery is
//! at-least-once, with the log as the source of truth.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use validator::Validate;

use crate::api::identity::Caller;
use crate::api::orders::handler::authorize_view;
use crate::core::ServerState;
use crate::db::repository::{order, tracking};
use crate::orders::{self, TrackingUpdate};
use crate::utils::{AppResponse, AppResult, ok};
use shared::message::FeedMessage;
use shared::order::{TrackingEvent, TrackingStatus, TrackingView};

#[derive(Debug, Deserialize)]
pub struct ResyncQuery {
    /// Last event ID the viewer has seen
    pub after: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub after: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TrackingUpdateRequest {
    pub status: TrackingStatus,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub estimated_time: Option<i64>,
}

/// GET /api/orders/{id}/tracking - 配送跟踪视图
pub async fn view(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(order_id): Path<i64>,
) -> AppResult<Json<AppResponse<TrackingView>>> {
    let order = order::find_by_id(state.db(), order_id).await?;
    authorize_view(&order, &actor)?;

    let history = tracking::history(state.db(), order_id).await?;
    Ok(ok(TrackingView::from_history(order_id, history)))
}

/// GET /api/orders/{id}/tracking/events?after= - 断线重连补发
pub async fn events(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(order_id): Path<i64>,
    Query(query): Query<ResyncQuery>,
) -> AppResult<Json<AppResponse<Vec<TrackingEvent>>>> {
    let order = order::find_by_id(state.db(), order_id).await?;
    authorize_view(&order, &actor)?;

    let missed = tracking::events_after(state.db(), order_id, &query.after).await?;
    Ok(ok(missed))
}

/// POST /api/orders/{id}/tracking - 配送员上报跟踪事件
pub async fn record(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(order_id): Path<i64>,
    Json(payload): Json<TrackingUpdateRequest>,
) -> AppResult<Json<AppResponse<TrackingEvent>>> {
    payload.validate()?;
    let event = orders::record_tracking(
        state.db(),
        state.feed(),
        order_id,
        TrackingUpdate {
            status: payload.status,
            location: payload.location,
            notes: payload.notes,
            estimated_time: payload.estimated_time,
        },
        &actor,
    )
    .await?;
    Ok(ok(event))
}

/// GET /api/orders/{id}/tracking/stream - SSE 实时流
pub async fn stream(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(order_id): Path<i64>,
    Query(query): Query<StreamQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let order = order::find_by_id(state.db(), order_id).await?;
    authorize_view(&order, &actor)?;

    // Subscribe before reading the backlog so nothing falls in the gap;
    // an event in both is delivered twice, which at-least-once allows
    let rx = state.feed().subscribe(order_id);

    let backlog: Vec<FeedMessage> = match &query.after {
        Some(after) => tracking::events_after(state.db(), order_id, after)
            .await?
            .into_iter()
            .map(FeedMessage::tracking_appended)
            .collect(),
        None => Vec::new(),
    };

    let shutdown = state.feed().shutdown_token().clone();
    let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });
    let stream = futures::stream::iter(backlog)
        .chain(live)
        .map(|msg| Event::default().event("feed").json_data(&msg))
        .take_until(shutdown.cancelled_owned());

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
