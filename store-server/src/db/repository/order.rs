//! Order Repository
//!
//! Orders and their item snapshots. Creation and status changes are
//! `_tx` functions composed by the checkout and lifecycle services into
//! larger transactions; reads go straight to the pool.

use sqlx::{SqliteConnection, SqlitePool};

use super::{RepoError, RepoResult};
use shared::order::{Order, OrderDetail, OrderItem, OrderStatus, PaymentStatus};
use shared::util::now_millis;

/// Insert the order row inside an enclosing transaction
pub async fn insert_tx(conn: &mut SqliteConnection, order: &Order) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO orders \
         (id, owner, status, payment_status, payment_method, subtotal, delivery_fee, \
          total_amount, delivery_address, notes, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(order.id)
    .bind(&order.owner)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(&order.payment_method)
    .bind(order.subtotal)
    .bind(order.delivery_fee)
    .bind(order.total_amount)
    .bind(&order.delivery_address)
    .bind(&order.notes)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Insert one item snapshot; the row ID is assigned by the database
pub async fn insert_item_tx(
    conn: &mut SqliteConnection,
    order_id: i64,
    product_id: i64,
    name: &str,
    quantity: i64,
    unit_price: i64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO order_items (order_id, product_id, name, quantity, unit_price, total_price) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(product_id)
    .bind(name)
    .bind(quantity)
    .bind(unit_price)
    .bind(unit_price * quantity)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Order> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    order.ok_or_else(|| RepoError::NotFound(format!("Order {id}")))
}

pub async fn items_of(pool: &SqlitePool, order_id: i64) -> RepoResult<Vec<OrderItem>> {
    Ok(
        sqlx::query_as("SELECT * FROM order_items WHERE order_id = ? ORDER BY id")
            .bind(order_id)
            .fetch_all(pool)
            .await?,
    )
}

/// Item snapshots read inside the cancellation transaction
pub async fn items_of_tx(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> RepoResult<Vec<OrderItem>> {
    Ok(
        sqlx::query_as("SELECT * FROM order_items WHERE order_id = ? ORDER BY id")
            .bind(order_id)
            .fetch_all(conn)
            .await?,
    )
}

pub async fn find_detail(pool: &SqlitePool, id: i64) -> RepoResult<OrderDetail> {
    let order = find_by_id(pool, id).await?;
    let items = items_of(pool, id).await?;
    Ok(OrderDetail { order, items })
}

/// Newest-first page of an owner's orders, optionally filtered by status.
///
/// Fetches one extra row to report whether more pages remain.
pub async fn list_by_owner(
    pool: &SqlitePool,
    owner: &str,
    status: Option<OrderStatus>,
    limit: i64,
    offset: i64,
) -> RepoResult<(Vec<Order>, bool)> {
    let mut orders: Vec<Order> = match status {
        Some(status) => {
            sqlx::query_as(
                "SELECT * FROM orders WHERE owner = ? AND status = ? \
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            )
            .bind(owner)
            .bind(status)
            .bind(limit + 1)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT * FROM orders WHERE owner = ? \
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            )
            .bind(owner)
            .bind(limit + 1)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
    };

    let has_more = orders.len() as i64 > limit;
    orders.truncate(limit as usize);
    Ok((orders, has_more))
}

/// Guarded status update: succeeds only when the row is still in `from`.
///
/// Returns the affected-row count; 0 means a concurrent transition won
/// and the caller must re-read and re-evaluate.
pub async fn update_status_tx(
    conn: &mut SqliteConnection,
    order_id: i64,
    from: OrderStatus,
    to: OrderStatus,
    payment_status: Option<PaymentStatus>,
) -> RepoResult<u64> {
    let rows = match payment_status {
        Some(payment) => {
            sqlx::query(
                "UPDATE orders SET status = ?, payment_status = ?, updated_at = ? \
                 WHERE id = ? AND status = ?",
            )
            .bind(to)
            .bind(payment)
            .bind(now_millis())
            .bind(order_id)
            .bind(from)
            .execute(conn)
            .await?
            .rows_affected()
        }
        None => {
            sqlx::query(
                "UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
            )
            .bind(to)
            .bind(now_millis())
            .bind(order_id)
            .bind(from)
            .execute(conn)
            .await?
            .rows_affected()
        }
    };
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use shared::util::snowflake_id;

    fn sample_order(owner: &str, status: OrderStatus, created_at: i64) -> Order {
        Order {
            id: snowflake_id(),
            owner: owner.into(),
            status,
            payment_status: PaymentStatus::Pending,
            payment_method: Some("cash".into()),
            subtotal: 5000,
            delivery_fee: 3000,
            total_amount: 8000,
            delivery_address: "1 Main St".into(),
            notes: None,
            created_at,
            updated_at: created_at,
        }
    }

    async fn insert(pool: &SqlitePool, order: &Order) {
        let mut tx = pool.begin().await.unwrap();
        insert_tx(&mut tx, order).await.unwrap();
        insert_item_tx(&mut tx, order.id, 1, "Tea", 2, 2500)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn detail_includes_item_snapshots() {
        let db = DbService::open_in_memory().await.unwrap();
        let order = sample_order("user:u1", OrderStatus::Pending, 1_000);
        insert(&db.pool, &order).await;

        let detail = find_detail(&db.pool, order.id).await.unwrap();
        assert_eq!(detail.order.total_amount, 8000);
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].total_price, 5000);
    }

    #[tokio::test]
    async fn list_pages_newest_first() {
        let db = DbService::open_in_memory().await.unwrap();
        for i in 0..3 {
            insert(
                &db.pool,
                &sample_order("user:u1", OrderStatus::Pending, 1_000 + i),
            )
            .await;
        }
        insert(
            &db.pool,
            &sample_order("user:other", OrderStatus::Pending, 5_000),
        )
        .await;

        let (page, has_more) = list_by_owner(&db.pool, "user:u1", None, 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(has_more);
        assert_eq!(page[0].created_at, 1_002);

        let (rest, has_more) = list_by_owner(&db.pool, "user:u1", None, 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert!(!has_more);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let db = DbService::open_in_memory().await.unwrap();
        insert(
            &db.pool,
            &sample_order("user:u1", OrderStatus::Pending, 1_000),
        )
        .await;
        insert(
            &db.pool,
            &sample_order("user:u1", OrderStatus::Delivered, 2_000),
        )
        .await;

        let (page, _) = list_by_owner(&db.pool, "user:u1", Some(OrderStatus::Delivered), 10, 0)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn guarded_update_rejects_stale_prior_status() {
        let db = DbService::open_in_memory().await.unwrap();
        let order = sample_order("user:u1", OrderStatus::Pending, 1_000);
        insert(&db.pool, &order).await;

        let mut tx = db.pool.begin().await.unwrap();
        let rows = update_status_tx(
            &mut tx,
            order.id,
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            None,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(rows, 1);

        // Prior status no longer matches
        let mut tx = db.pool.begin().await.unwrap();
        let rows = update_status_tx(
            &mut tx,
            order.id,
            OrderStatus::Pending,
            OrderStatus::Cancelled,
            None,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(rows, 0);

        let current = find_by_id(&db.pool, order.id).await.unwrap();
        assert_eq!(current.status, OrderStatus::Confirmed);
    }
}
