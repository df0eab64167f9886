//! Stock Ledger
//!
//! Sole authority over `products.stock_quantity`. All mutation goes
//! through the atomic operations here; no other component may
//! read-then-write the counter. Reservation is a single guarded UPDATE
//! (`... SET stock_quantity = stock_quantity - N WHERE stock_quantity >= N`)
//! with the affected-row count as the success signal, so two concurrent
//! reservations can never both observe pre-decrement state.

use sqlx::{SqliteConnection, SqlitePool};

use super::{RepoError, RepoResult};
use shared::util::now_millis;

/// Outcome of a reservation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Stock decremented by the requested quantity
    Reserved,
    /// Product purchasable but not enough units left
    Insufficient,
    /// Product exists but is not purchasable
    NotPurchasable,
}

/// Atomically check purchasability and availability, and decrement.
///
/// Never drives `stock_quantity` negative: an attempt that would is
/// rejected as [`ReserveOutcome::Insufficient`], not clamped.
pub async fn try_reserve(
    pool: &SqlitePool,
    product_id: i64,
    quantity: i64,
) -> RepoResult<ReserveOutcome> {
    if quantity <= 0 {
        return Err(RepoError::Validation(format!(
            "Reserve quantity must be positive: {quantity}"
        )));
    }

    let rows = sqlx::query(
        "UPDATE products SET stock_quantity = stock_quantity - ?1, updated_at = ?2 \
         WHERE id = ?3 AND is_available = 1 AND stock_quantity >= ?1",
    )
    .bind(quantity)
    .bind(now_millis())
    .bind(product_id)
    .execute(pool)
    .await?
    .rows_affected();

    if rows == 1 {
        return Ok(ReserveOutcome::Reserved);
    }

    // Guard rejected the update; classify why for the caller
    let row: Option<(bool,)> =
        sqlx::query_as("SELECT is_available FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_optional(pool)
            .await?;

    match row {
        None => Err(RepoError::NotFound(format!("Product {product_id}"))),
        Some((false,)) => Ok(ReserveOutcome::NotPurchasable),
        Some((true,)) => Ok(ReserveOutcome::Insufficient),
    }
}

/// Atomically return previously reserved units to the ledger.
///
/// Commutes with concurrent reservations; used by checkout compensation
/// and by cancellation restitution.
pub async fn restore(pool: &SqlitePool, product_id: i64, quantity: i64) -> RepoResult<()> {
    let rows = restore_query(quantity, product_id)
        .execute(pool)
        .await?
        .rows_affected();
    if rows == 0 {
        return Err(RepoError::NotFound(format!("Product {product_id}")));
    }
    Ok(())
}

/// Restitution inside an enclosing transaction (cancellation path)
pub async fn restore_tx(
    conn: &mut SqliteConnection,
    product_id: i64,
    quantity: i64,
) -> RepoResult<()> {
    let rows = restore_query(quantity, product_id)
        .execute(conn)
        .await?
        .rows_affected();
    if rows == 0 {
        return Err(RepoError::NotFound(format!("Product {product_id}")));
    }
    Ok(())
}

fn restore_query(
    quantity: i64,
    product_id: i64,
) -> sqlx::query::Query<'static, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'static>> {
    sqlx::query(
        "UPDATE products SET stock_quantity = stock_quantity + ?1, updated_at = ?2 \
         WHERE id = ?3",
    )
    .bind(quantity)
    .bind(now_millis())
    .bind(product_id)
}

/// Current available quantity (diagnostics and tests)
pub async fn quantity_of(pool: &SqlitePool, product_id: i64) -> RepoResult<i64> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT stock_quantity FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_optional(pool)
            .await?;
    row.map(|(q,)| q)
        .ok_or_else(|| RepoError::NotFound(format!("Product {product_id}")))
}
