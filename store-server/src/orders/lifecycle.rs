//! 订单生命周期状态机
//!
//! Drives `pending → confirmed → preparing → delivering → delivered`,
//! with `cancelled` reachable until the order goes out for delivery.
//! Every transition writes the status change and its tracking event in
//! one transaction; cancellation additionally restores the reserved
//! stock inside that same transaction, so a failed restitution rolls
//! the whole cancellation back.
//!
//! The status `UPDATE` is guarded by the expected prior status. Under
//! concurrency only one of two competing transitions can win; the loser
//! observes zero affected rows and reports an illegal transition from
//! the now-current status.

use sqlx::SqlitePool;

use crate::db::repository::{order, stock, tracking};
use crate::message::OrderFeed;
use crate::orders::error::{OrderError, OrderResult};
use shared::message::FeedMessage;
use shared::order::{
    Actor, Order, OrderStatus, PaymentStatus, TrackingEvent, TrackingStatus,
};

/// Courier-reported tracking update
#[derive(Debug, Clone)]
pub struct TrackingUpdate {
    pub status: TrackingStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub estimated_time: Option<i64>,
}

/// Drive an order to `target`, enforcing actor rules and legality
pub async fn transition(
    pool: &SqlitePool,
    feed: &OrderFeed,
    order_id: i64,
    target: OrderStatus,
    actor: &Actor,
    payment_status: Option<PaymentStatus>,
) -> OrderResult<Order> {
    let current = find_order(pool, order_id).await?;
    authorize(&current, target, actor, payment_status.is_some())?;

    if !current.status.can_transition_to(target) {
        return Err(OrderError::IllegalTransition {
            from: current.status,
            to: target,
        });
    }

    let event = TrackingEvent::new(order_id, target.tracking_status());

    // Held across commit and publish: two winning transitions must hit
    // the feed in the same order they hit the log
    let write_lock = feed.write_lock(order_id);
    let _guard = write_lock.lock().await;

    let mut tx = pool.begin().await?;
    let rows =
        order::update_status_tx(&mut tx, order_id, current.status, target, payment_status).await?;
    if rows == 0 {
        // A concurrent transition won; report against the fresh status
        drop(tx);
        let fresh = find_order(pool, order_id).await?;
        return Err(OrderError::IllegalTransition {
            from: fresh.status,
            to: target,
        });
    }

    if target == OrderStatus::Cancelled {
        let items = order::items_of_tx(&mut tx, order_id).await?;
        for item in &items {
            stock::restore_tx(&mut tx, item.product_id, item.quantity)
                .await
                .map_err(|e| {
                    tracing::error!(
                        order_id,
                        product_id = item.product_id,
                        error = %e,
                        "Cancellation restitution failed, rolling back"
                    );
                    OrderError::RestitutionFailed(format!("product {}: {e}", item.product_id))
                })?;
        }
    }

    tracking::append_tx(&mut tx, &event).await?;
    tx.commit().await?;

    let updated = find_order(pool, order_id).await?;
    feed.publish(FeedMessage::order_updated(updated.clone()));
    feed.publish(FeedMessage::tracking_appended(event));

    tracing::info!(order_id, from = %current.status, to = %target, "Order transitioned");
    Ok(updated)
}

/// Append a courier tracking update; statuses that imply an order status
/// drive the state machine in the same transaction.
pub async fn record_tracking(
    pool: &SqlitePool,
    feed: &OrderFeed,
    order_id: i64,
    update: TrackingUpdate,
    actor: &Actor,
) -> OrderResult<TrackingEvent> {
    if !actor.is_operator() {
        return Err(OrderError::Forbidden(
            "Only operators may record tracking updates".into(),
        ));
    }
    let current = find_order(pool, order_id).await?;

    let mut event = TrackingEvent::new(order_id, update.status);
    event.location = update.location;
    event.notes = update.notes;
    event.estimated_time = update.estimated_time;

    // Location pings and notes carry a status the order is already in;
    // out_for_delivery / delivered advance the order itself
    let implied = update
        .status
        .implied_order_status()
        .filter(|implied| *implied != current.status);

    // Same commit-and-publish ordering lock as transition()
    let write_lock = feed.write_lock(order_id);
    let _guard = write_lock.lock().await;

    let mut tx = pool.begin().await?;
    let mut status_changed = false;
    if let Some(target) = implied {
        if !current.status.can_transition_to(target) {
            return Err(OrderError::IllegalTransition {
                from: current.status,
                to: target,
            });
        }
        let rows = order::update_status_tx(&mut tx, order_id, current.status, target, None).await?;
        if rows == 0 {
            drop(tx);
            let fresh = find_order(pool, order_id).await?;
            return Err(OrderError::IllegalTransition {
                from: fresh.status,
                to: target,
            });
        }
        status_changed = true;
    }
    tracking::append_tx(&mut tx, &event).await?;
    tx.commit().await?;

    if status_changed {
        let updated = find_order(pool, order_id).await?;
        feed.publish(FeedMessage::order_updated(updated));
    }
    feed.publish(FeedMessage::tracking_appended(event.clone()));

    tracing::info!(order_id, status = %event.status, "Tracking event recorded");
    Ok(event)
}

async fn find_order(pool: &SqlitePool, order_id: i64) -> OrderResult<Order> {
    order::find_by_id(pool, order_id)
        .await
        .map_err(|_| OrderError::OrderNotFound(order_id))
}

/// Actor rules: operators drive any legal transition; customers may only
/// cancel, and only their own orders.
fn authorize(
    order: &Order,
    target: OrderStatus,
    actor: &Actor,
    touches_payment: bool,
) -> OrderResult<()> {
    match actor {
        Actor::Operator { .. } => Ok(()),
        Actor::Customer { owner } => {
            if order.owner != *owner {
                // Foreign orders are invisible, not merely forbidden
                return Err(OrderError::OrderNotFound(order.id));
            }
            if target != OrderStatus::Cancelled {
                return Err(OrderError::Forbidden(
                    "Customers may only cancel orders".into(),
                ));
            }
            if touches_payment {
                return Err(OrderError::Forbidden(
                    "Customers may not change payment status".into(),
                ));
            }
            Ok(())
        }
    }
}
