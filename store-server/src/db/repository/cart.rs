//! Cart Repository
//!
//! One cart per owner identity, created lazily on first interaction.
//! Line quantities are absolute in `set_quantity` and additive in
//! `add_item`; a quantity driven to zero or below removes the line.

use sqlx::SqlitePool;

use super::{RepoError, RepoResult};
use shared::models::{Cart, CartItemDetail, CartOwner, CartSnapshot, merge_items};
use shared::util::{now_millis, snowflake_id};

/// Fetch the owner's cart, creating it if absent
pub async fn get_or_create(pool: &SqlitePool, owner: &CartOwner) -> RepoResult<Cart> {
    if let Some(cart) = find(pool, owner).await? {
        return Ok(cart);
    }

    let (user_id, session_id) = match owner {
        CartOwner::User(id) => (Some(id.as_str()), None),
        CartOwner::Session(token) => (None, Some(token.as_str())),
    };
    let cart = Cart {
        id: snowflake_id(),
        user_id: user_id.map(str::to_owned),
        session_id: session_id.map(str::to_owned),
        created_at: now_millis(),
    };

    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO carts (id, user_id, session_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(cart.id)
    .bind(&cart.user_id)
    .bind(&cart.session_id)
    .bind(cart.created_at)
    .execute(pool)
    .await?
    .rows_affected();

    if inserted == 1 {
        return Ok(cart);
    }
    // Lost the creation race; the unique index guarantees the row exists now
    find(pool, owner)
        .await?
        .ok_or_else(|| RepoError::Database(format!("Cart for {owner} vanished after insert")))
}

async fn find(pool: &SqlitePool, owner: &CartOwner) -> RepoResult<Option<Cart>> {
    let query = match owner {
        CartOwner::User(id) => {
            sqlx::query_as("SELECT * FROM carts WHERE user_id = ?").bind(id.as_str())
        }
        CartOwner::Session(token) => {
            sqlx::query_as("SELECT * FROM carts WHERE session_id = ?").bind(token.as_str())
        }
    };
    Ok(query.fetch_optional(pool).await?)
}

/// Add units of a product, summing with any existing line
pub async fn add_item(
    pool: &SqlitePool,
    owner: &CartOwner,
    product_id: i64,
    quantity: i64,
) -> RepoResult<CartSnapshot> {
    if quantity <= 0 {
        return Err(RepoError::Validation(format!(
            "Quantity must be positive: {quantity}"
        )));
    }
    let cart = get_or_create(pool, owner).await?;
    let now = now_millis();
    sqlx::query(
        "INSERT INTO cart_items (cart_id, product_id, quantity, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT (cart_id, product_id) \
         DO UPDATE SET quantity = quantity + excluded.quantity, updated_at = excluded.updated_at",
    )
    .bind(cart.id)
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    snapshot_of(pool, cart.id).await
}

/// Set a line to an absolute quantity; zero or below removes the line
pub async fn set_quantity(
    pool: &SqlitePool,
    owner: &CartOwner,
    product_id: i64,
    quantity: i64,
) -> RepoResult<CartSnapshot> {
    let cart = get_or_create(pool, owner).await?;
    if quantity <= 0 {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = ? AND product_id = ?")
            .bind(cart.id)
            .bind(product_id)
            .execute(pool)
            .await?;
    } else {
        let rows = sqlx::query(
            "UPDATE cart_items SET quantity = ?, updated_at = ? \
             WHERE cart_id = ? AND product_id = ?",
        )
        .bind(quantity)
        .bind(now_millis())
        .bind(cart.id)
        .bind(product_id)
        .execute(pool)
        .await?
        .rows_affected();
        if rows == 0 {
            return Err(RepoError::NotFound(format!(
                "Cart line for product {product_id}"
            )));
        }
    }
    snapshot_of(pool, cart.id).await
}

pub async fn remove_item(
    pool: &SqlitePool,
    owner: &CartOwner,
    product_id: i64,
) -> RepoResult<CartSnapshot> {
    set_quantity(pool, owner, product_id, 0).await
}

/// Remove every line from the owner's cart
pub async fn clear(pool: &SqlitePool, owner: &CartOwner) -> RepoResult<()> {
    let cart = get_or_create(pool, owner).await?;
    sqlx::query("DELETE FROM cart_items WHERE cart_id = ?")
        .bind(cart.id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Cart lines joined with their products, with computed totals
pub async fn snapshot(pool: &SqlitePool, owner: &CartOwner) -> RepoResult<CartSnapshot> {
    let cart = get_or_create(pool, owner).await?;
    snapshot_of(pool, cart.id).await
}

async fn snapshot_of(pool: &SqlitePool, cart_id: i64) -> RepoResult<CartSnapshot> {
    let items: Vec<CartItemDetail> = sqlx::query_as(
        "SELECT ci.product_id, p.name, p.price, ci.quantity, p.stock_quantity, p.is_available \
         FROM cart_items ci JOIN products p ON p.id = ci.product_id \
         WHERE ci.cart_id = ? \
         ORDER BY ci.created_at, ci.product_id",
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await?;
    Ok(CartSnapshot::from_items(cart_id, items))
}

/// Merge a session cart into a user cart at login.
///
/// Union by product with quantities summed; the session cart is emptied in
/// the same transaction, which is what makes a repeated merge a no-op.
pub async fn merge(
    pool: &SqlitePool,
    user: &CartOwner,
    session: &CartOwner,
) -> RepoResult<CartSnapshot> {
    let target = get_or_create(pool, user).await?;
    let source = match find(pool, session).await? {
        Some(cart) => cart,
        // Nothing to merge
        None => return snapshot_of(pool, target.id).await,
    };

    let mut tx = pool.begin().await?;

    let target_items: Vec<(i64, i64)> =
        sqlx::query_as("SELECT product_id, quantity FROM cart_items WHERE cart_id = ?")
            .bind(target.id)
            .fetch_all(&mut *tx)
            .await?;
    let source_items: Vec<(i64, i64)> =
        sqlx::query_as("SELECT product_id, quantity FROM cart_items WHERE cart_id = ?")
            .bind(source.id)
            .fetch_all(&mut *tx)
            .await?;

    let merged = merge_items(&target_items, &source_items);

    sqlx::query("DELETE FROM cart_items WHERE cart_id = ?")
        .bind(target.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM cart_items WHERE cart_id = ?")
        .bind(source.id)
        .execute(&mut *tx)
        .await?;

    let now = now_millis();
    for (product_id, quantity) in merged {
        sqlx::query(
            "INSERT INTO cart_items (cart_id, product_id, quantity, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(target.id)
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    snapshot_of(pool, target.id).await
}
