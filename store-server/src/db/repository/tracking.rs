//! Tracking Log Repository
//!
//! Append-only delivery tracking records. Ordering is `occurred_at` with
//! the rowid as insertion-order tie-break; nothing here updates or
//! deletes. `events_after` is the reconnect resync read: the log, not
//! the live feed, is the source of truth.

use sqlx::{SqliteConnection, SqlitePool};

use super::RepoResult;
use shared::order::TrackingEvent;

const EVENT_COLUMNS: &str =
    "event_id, order_id, status, location, notes, estimated_time, occurred_at";

/// Append one event inside an enclosing transaction
pub async fn append_tx(conn: &mut SqliteConnection, event: &TrackingEvent) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO delivery_tracking \
         (event_id, order_id, status, location, notes, estimated_time, occurred_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&event.event_id)
    .bind(event.order_id)
    .bind(event.status)
    .bind(&event.location)
    .bind(&event.notes)
    .bind(event.estimated_time)
    .bind(event.occurred_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Full history of an order in append order
pub async fn history(pool: &SqlitePool, order_id: i64) -> RepoResult<Vec<TrackingEvent>> {
    let events = sqlx::query_as(&format!(
        "SELECT {EVENT_COLUMNS} FROM delivery_tracking \
         WHERE order_id = ? ORDER BY occurred_at, id"
    ))
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(events)
}

/// Events appended after the given last-seen event ID.
///
/// An unknown `after` ID replays the whole log rather than guessing a
/// position in it.
pub async fn events_after(
    pool: &SqlitePool,
    order_id: i64,
    after_event_id: &str,
) -> RepoResult<Vec<TrackingEvent>> {
    let events = sqlx::query_as(&format!(
        "SELECT {EVENT_COLUMNS} FROM delivery_tracking \
         WHERE order_id = ?1 \
           AND id > COALESCE(\
                 (SELECT id FROM delivery_tracking WHERE event_id = ?2 AND order_id = ?1), 0) \
         ORDER BY occurred_at, id"
    ))
    .bind(order_id)
    .bind(after_event_id)
    .fetch_all(pool)
    .await?;
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::db::repository::order;
    use shared::order::{Order, OrderStatus, PaymentStatus, TrackingStatus};
    use shared::util::snowflake_id;

    async fn seed_order(pool: &SqlitePool) -> i64 {
        let order = Order {
            id: snowflake_id(),
            owner: "user:u1".into(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            subtotal: 1000,
            delivery_fee: 3000,
            total_amount: 4000,
            delivery_address: "1 Main St".into(),
            notes: None,
            created_at: 1_000,
            updated_at: 1_000,
        };
        let mut tx = pool.begin().await.unwrap();
        order::insert_tx(&mut tx, &order).await.unwrap();
        tx.commit().await.unwrap();
        order.id
    }

    async fn append(pool: &SqlitePool, event: &TrackingEvent) {
        let mut tx = pool.begin().await.unwrap();
        append_tx(&mut tx, event).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn history_preserves_append_order_on_equal_timestamps() {
        let db = DbService::open_in_memory().await.unwrap();
        let order_id = seed_order(&db.pool).await;

        let mut first = TrackingEvent::new(order_id, TrackingStatus::OrderPlaced);
        let mut second = TrackingEvent::new(order_id, TrackingStatus::OrderConfirmed);
        // Same millisecond; insertion order must break the tie
        first.occurred_at = 5_000;
        second.occurred_at = 5_000;
        append(&db.pool, &first).await;
        append(&db.pool, &second).await;

        let log = history(&db.pool, order_id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].event_id, first.event_id);
        assert_eq!(log[1].event_id, second.event_id);
    }

    #[tokio::test]
    async fn events_after_returns_missed_suffix() {
        let db = DbService::open_in_memory().await.unwrap();
        let order_id = seed_order(&db.pool).await;

        let placed = TrackingEvent::new(order_id, TrackingStatus::OrderPlaced);
        let confirmed = TrackingEvent::new(order_id, TrackingStatus::OrderConfirmed);
        let preparing = TrackingEvent::new(order_id, TrackingStatus::Preparing);
        append(&db.pool, &placed).await;
        append(&db.pool, &confirmed).await;
        append(&db.pool, &preparing).await;

        let missed = events_after(&db.pool, order_id, &placed.event_id)
            .await
            .unwrap();
        assert_eq!(missed.len(), 2);
        assert_eq!(missed[0].event_id, confirmed.event_id);
        assert_eq!(missed[1].event_id, preparing.event_id);
    }

    #[tokio::test]
    async fn events_after_unknown_id_replays_everything() {
        let db = DbService::open_in_memory().await.unwrap();
        let order_id = seed_order(&db.pool).await;
        append(&db.pool, &TrackingEvent::new(order_id, TrackingStatus::OrderPlaced)).await;

        let all = events_after(&db.pool, order_id, "no-such-event")
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }
}
