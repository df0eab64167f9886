//! Product Repository
//!
//! Catalog reads plus creation for seeding and admin tooling. Stock
//! quantity is read here but never written; that column belongs to the
//! stock ledger.

use sqlx::SqlitePool;

use super::{RepoError, RepoResult};
use shared::models::{Product, ProductCreate};
use shared::util::{now_millis, snowflake_id};

/// Insert a new product
pub async fn create(pool: &SqlitePool, payload: ProductCreate) -> RepoResult<Product> {
    if payload.price < 0 {
        return Err(RepoError::Validation(format!(
            "Price must not be negative: {}",
            payload.price
        )));
    }
    if payload.stock_quantity < 0 {
        return Err(RepoError::Validation(format!(
            "Stock quantity must not be negative: {}",
            payload.stock_quantity
        )));
    }

    let now = now_millis();
    let product = Product {
        id: snowflake_id(),
        name: payload.name,
        description: payload.description.unwrap_or_default(),
        price: payload.price,
        image_url: payload.image_url,
        category: payload.category,
        stock_quantity: payload.stock_quantity,
        is_available: payload.is_available.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO products \
         (id, name, description, price, image_url, category, stock_quantity, is_available, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price)
    .bind(&product.image_url)
    .bind(&product.category)
    .bind(product.stock_quantity)
    .bind(product.is_available)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(pool)
    .await?;

    Ok(product)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Product> {
    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    product.ok_or_else(|| RepoError::NotFound(format!("Product {id}")))
}

/// Toggle purchasability (admin tooling)
pub async fn set_available(pool: &SqlitePool, id: i64, available: bool) -> RepoResult<()> {
    let rows = sqlx::query("UPDATE products SET is_available = ?, updated_at = ? WHERE id = ?")
        .bind(available)
        .bind(now_millis())
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    if rows == 0 {
        return Err(RepoError::NotFound(format!("Product {id}")));
    }
    Ok(())
}
