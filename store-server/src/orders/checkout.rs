//! 结算事务
//!
//! Turns a cart into an order:
//!
//! 1. Snapshot the cart (empty cart fails fast)
//! 2. Availability pre-check before touching the ledger
//! 3. All-or-nothing stock reservation; on the first failing line every
//!    already-reserved line is restored
//! 4. Order + item snapshots + initial `order_placed` tracking event in
//!    one DB transaction; a failed write also restores the reservation
//! 5. Clear the cart, publish to the realtime feed
//!
//! Prices are frozen at step 4; later catalog edits never rewrite an
//! order. Duplicate submission protection is the caller's obligation
//! (disable the button, dedupe client-side).

use sqlx::SqlitePool;

use crate::db::repository::stock::ReserveOutcome;
use crate::db::repository::{RepoResult, cart, order, stock, tracking};
use crate::message::OrderFeed;
use crate::orders::error::{OrderError, OrderResult};
use shared::message::FeedMessage;
use shared::models::{CartItemDetail, CartOwner};
use shared::order::{
    DeliveryInfo, Order, OrderDetail, OrderStatus, PaymentStatus, TrackingEvent, TrackingStatus,
};
use shared::util::{now_millis, snowflake_id};

/// Initial delivery estimate stamped on the `order_placed` event
const INITIAL_ETA_MS: i64 = 30 * 60 * 1000;

/// Place an order from the owner's cart
pub async fn checkout(
    pool: &SqlitePool,
    feed: &OrderFeed,
    owner: &CartOwner,
    info: DeliveryInfo,
    delivery_fee: i64,
) -> OrderResult<OrderDetail> {
    let snapshot = cart::snapshot(pool, owner).await?;
    if snapshot.is_empty() {
        return Err(OrderError::EmptyCart);
    }

    // Fail before touching the ledger when a line is plainly dead
    if let Some(item) = snapshot.items.iter().find(|i| !i.is_available) {
        return Err(OrderError::ProductUnavailable {
            product_id: item.product_id,
            name: item.name.clone(),
        });
    }

    // All-or-nothing reservation: the ledger decides under concurrency,
    // the pre-check above is only a courtesy
    let mut reserved: Vec<(i64, i64)> = Vec::with_capacity(snapshot.items.len());
    for item in &snapshot.items {
        match stock::try_reserve(pool, item.product_id, item.quantity).await {
            Ok(ReserveOutcome::Reserved) => reserved.push((item.product_id, item.quantity)),
            Ok(ReserveOutcome::Insufficient) => {
                release(pool, &reserved).await?;
                return Err(OrderError::InsufficientStock {
                    product_id: item.product_id,
                    name: item.name.clone(),
                });
            }
            Ok(ReserveOutcome::NotPurchasable) => {
                release(pool, &reserved).await?;
                return Err(OrderError::ProductUnavailable {
                    product_id: item.product_id,
                    name: item.name.clone(),
                });
            }
            Err(e) => {
                release(pool, &reserved).await?;
                return Err(e.into());
            }
        }
    }

    let now = now_millis();
    let order = Order {
        id: snowflake_id(),
        owner: owner.key(),
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_method: info.payment_method,
        subtotal: snapshot.subtotal,
        delivery_fee,
        total_amount: snapshot.subtotal + delivery_fee,
        delivery_address: info.delivery_address,
        notes: info.notes,
        created_at: now,
        updated_at: now,
    };
    let placed = TrackingEvent::new(order.id, TrackingStatus::OrderPlaced)
        .with_estimated_time(now + INITIAL_ETA_MS);

    if let Err(e) = persist(pool, &order, &snapshot.items, &placed).await {
        // Durable write failed; give the reserved stock back
        release(pool, &reserved).await?;
        return Err(e.into());
    }

    // The order is durable; a failed cart cleanup must not fail the
    // checkout (the stale cart clears on its next interaction)
    if let Err(e) = cart::clear(pool, owner).await {
        tracing::warn!(order_id = order.id, owner = %order.owner, error = %e, "Cart cleanup failed after checkout");
    }

    let detail = order::find_detail(pool, order.id).await?;
    feed.publish(FeedMessage::order_created(detail.order.clone()));
    feed.publish(FeedMessage::tracking_appended(placed));

    tracing::info!(
        order_id = order.id,
        owner = %order.owner,
        total = order.total_amount,
        "Order placed"
    );

    Ok(detail)
}

async fn persist(
    pool: &SqlitePool,
    order: &Order,
    items: &[CartItemDetail],
    placed: &TrackingEvent,
) -> RepoResult<()> {
    let mut tx = pool.begin().await?;
    order::insert_tx(&mut tx, order).await?;
    for item in items {
        order::insert_item_tx(
            &mut tx,
            order.id,
            item.product_id,
            &item.name,
            item.quantity,
            item.price,
        )
        .await?;
    }
    tracking::append_tx(&mut tx, placed).await?;
    tx.commit().await?;
    Ok(())
}

/// Compensating restore of already-reserved lines.
///
/// A failure here leaves the ledger short and is escalated instead of
/// being reported as the original stock error.
async fn release(pool: &SqlitePool, reserved: &[(i64, i64)]) -> OrderResult<()> {
    for &(product_id, quantity) in reserved {
        stock::restore(pool, product_id, quantity)
            .await
            .map_err(|e| {
                tracing::error!(product_id, quantity, error = %e, "Stock restitution failed");
                OrderError::RestitutionFailed(format!("product {product_id}: {e}"))
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::db::repository::product;
    use shared::message::FeedPayload;
    use shared::models::ProductCreate;

    async fn seed_product(pool: &SqlitePool, name: &str, price: i64, stock: i64) -> i64 {
        product::create(
            pool,
            ProductCreate {
                name: name.into(),
                description: None,
                price,
                image_url: None,
                category: None,
                stock_quantity: stock,
                is_available: Some(true),
            },
        )
        .await
        .unwrap()
        .id
    }

    fn delivery() -> DeliveryInfo {
        DeliveryInfo {
            delivery_address: "1 Main St".into(),
            payment_method: Some("cash".into()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn checkout_places_pending_order_with_frozen_prices() {
        let db = DbService::open_in_memory().await.unwrap();
        let feed = OrderFeed::with_capacity(16);
        let owner = CartOwner::User("u1".into());
        let tea = seed_product(&db.pool, "Tea", 900, 10).await;
        let coffee = seed_product(&db.pool, "Coffee", 1200, 10).await;

        cart::add_item(&db.pool, &owner, tea, 2).await.unwrap();
        cart::add_item(&db.pool, &owner, coffee, 1).await.unwrap();

        let detail = checkout(&db.pool, &feed, &owner, delivery(), 3000)
            .await
            .unwrap();

        assert_eq!(detail.order.status, OrderStatus::Pending);
        assert_eq!(detail.order.subtotal, 3000);
        assert_eq!(detail.order.total_amount, 6000);
        assert_eq!(detail.items.len(), 2);

        // Later price edits must not rewrite the order
        let frozen: i64 = detail.items.iter().map(|i| i.total_price).sum();
        assert_eq!(frozen, detail.order.subtotal);

        // Stock reserved, cart cleared
        assert_eq!(stock::quantity_of(&db.pool, tea).await.unwrap(), 8);
        assert_eq!(stock::quantity_of(&db.pool, coffee).await.unwrap(), 9);
        assert!(cart::snapshot(&db.pool, &owner).await.unwrap().is_empty());

        // Initial tracking event carries the delivery estimate
        let log = tracking::history(&db.pool, detail.order.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, TrackingStatus::OrderPlaced);
        assert!(log[0].estimated_time.is_some());
    }

    #[tokio::test]
    async fn catalog_price_edit_after_checkout_leaves_order_untouched() {
        let db = DbService::open_in_memory().await.unwrap();
        let feed = OrderFeed::with_capacity(16);
        let owner = CartOwner::User("u1".into());
        let tea = seed_product(&db.pool, "Tea", 900, 10).await;
        cart::add_item(&db.pool, &owner, tea, 2).await.unwrap();

        let placed = checkout(&db.pool, &feed, &owner, delivery(), 3000)
            .await
            .unwrap();

        sqlx::query("UPDATE products SET price = 9900 WHERE id = ?1")
            .bind(tea)
            .execute(&db.pool)
            .await
            .unwrap();

        let reread = order::find_detail(&db.pool, placed.order.id).await.unwrap();
        assert_eq!(reread.items[0].unit_price, 900);
        assert_eq!(reread.items[0].total_price, 1800);
        assert_eq!(reread.order.subtotal, 1800);
        assert_eq!(reread.order.total_amount, 4800);
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let db = DbService::open_in_memory().await.unwrap();
        let feed = OrderFeed::with_capacity(16);
        let owner = CartOwner::User("u1".into());

        let result = checkout(&db.pool, &feed, &owner, delivery(), 3000).await;
        assert!(matches!(result, Err(OrderError::EmptyCart)));
    }

    #[tokio::test]
    async fn unavailable_product_fails_without_touching_stock() {
        let db = DbService::open_in_memory().await.unwrap();
        let feed = OrderFeed::with_capacity(16);
        let owner = CartOwner::User("u1".into());
        let tea = seed_product(&db.pool, "Tea", 900, 10).await;

        cart::add_item(&db.pool, &owner, tea, 1).await.unwrap();
        product::set_available(&db.pool, tea, false).await.unwrap();

        let result = checkout(&db.pool, &feed, &owner, delivery(), 3000).await;
        assert!(
            matches!(result, Err(OrderError::ProductUnavailable { product_id, .. }) if product_id == tea)
        );
        assert_eq!(stock::quantity_of(&db.pool, tea).await.unwrap(), 10);
        // Cart survives the failed checkout
        assert!(!cart::snapshot(&db.pool, &owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_reservation_is_rolled_back() {
        let db = DbService::open_in_memory().await.unwrap();
        let feed = OrderFeed::with_capacity(16);
        let owner = CartOwner::User("u1".into());
        let tea = seed_product(&db.pool, "Tea", 900, 10).await;
        let coffee = seed_product(&db.pool, "Coffee", 1200, 1).await;

        cart::add_item(&db.pool, &owner, tea, 2).await.unwrap();
        cart::add_item(&db.pool, &owner, coffee, 5).await.unwrap();

        let result = checkout(&db.pool, &feed, &owner, delivery(), 3000).await;
        assert!(
            matches!(result, Err(OrderError::InsufficientStock { product_id, .. }) if product_id == coffee)
        );

        // The tea reservation was compensated
        assert_eq!(stock::quantity_of(&db.pool, tea).await.unwrap(), 10);
        assert_eq!(stock::quantity_of(&db.pool, coffee).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_cart_cleanup_does_not_fail_the_checkout() {
        let db = DbService::open_in_memory().await.unwrap();
        let feed = OrderFeed::with_capacity(16);
        let owner = CartOwner::User("u1".into());
        let tea = seed_product(&db.pool, "Tea", 900, 10).await;
        cart::add_item(&db.pool, &owner, tea, 1).await.unwrap();

        // Make cart cleanup fail while leaving every other write alone
        sqlx::query(
            "CREATE TRIGGER cart_items_locked BEFORE DELETE ON cart_items \
             BEGIN SELECT RAISE(ABORT, 'locked'); END",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let detail = checkout(&db.pool, &feed, &owner, delivery(), 3000)
            .await
            .unwrap();

        // The order is durable and the stale cart merely lingers
        let reread = order::find_detail(&db.pool, detail.order.id).await.unwrap();
        assert_eq!(reread.order.status, OrderStatus::Pending);
        assert_eq!(stock::quantity_of(&db.pool, tea).await.unwrap(), 9);
        assert!(!cart::snapshot(&db.pool, &owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkout_publishes_creation_and_tracking() {
        let db = DbService::open_in_memory().await.unwrap();
        let feed = OrderFeed::with_capacity(16);
        let owner = CartOwner::User("u1".into());
        let tea = seed_product(&db.pool, "Tea", 900, 10).await;
        cart::add_item(&db.pool, &owner, tea, 1).await.unwrap();

        let mut rx = feed.subscribe_all();
        let detail = checkout(&db.pool, &feed, &owner, delivery(), 3000)
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.order_id, detail.order.id);
        assert!(matches!(first.payload, FeedPayload::OrderCreated { .. }));

        let second = rx.recv().await.unwrap();
        assert!(matches!(second.payload, FeedPayload::TrackingAppended { .. }));
    }
}
