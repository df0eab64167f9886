//! Product Model

use serde::{Deserialize, Serialize};

/// Product entity
///
/// `stock_quantity` is owned by the stock ledger and is only ever mutated
/// through its atomic reserve/restore operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Price in minor currency units
    pub price: i64,
    pub image_url: Option<String>,
    pub category: Option<String>,
    /// Available units; never negative
    pub stock_quantity: i64,
    pub is_available: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create product payload (seeding and admin tooling)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub stock_quantity: i64,
    pub is_available: Option<bool>,
}
