//! Cart Models
//!
//! Carts are keyed by an owner identity: a user ID for authenticated
//! customers, or an opaque session token for anonymous ones. Exactly one
//! cart exists per identity; it is created lazily on first interaction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Cart owner identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    /// Authenticated user
    User(String),
    /// Anonymous session token
    Session(String),
}

impl CartOwner {
    /// Opaque key used to stamp orders with their owner
    pub fn key(&self) -> String {
        match self {
            CartOwner::User(id) => format!("user:{id}"),
            CartOwner::Session(token) => format!("session:{token}"),
        }
    }
}

impl std::fmt::Display for CartOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Cart entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Cart {
    pub id: i64,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub created_at: i64,
}

/// Cart line: unique per (cart, product)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CartItem {
    pub cart_id: i64,
    pub product_id: i64,
    pub quantity: i64,
}

/// Cart line joined with its product for display and checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CartItemDetail {
    pub product_id: i64,
    pub name: String,
    /// Current catalog price (frozen into the order only at checkout)
    pub price: i64,
    pub quantity: i64,
    pub stock_quantity: i64,
    pub is_available: bool,
}

impl CartItemDetail {
    pub fn line_total(&self) -> i64 {
        self.price * self.quantity
    }
}

/// Cart view with computed totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub cart_id: i64,
    pub items: Vec<CartItemDetail>,
    pub subtotal: i64,
    pub item_count: i64,
}

impl CartSnapshot {
    pub fn from_items(cart_id: i64, items: Vec<CartItemDetail>) -> Self {
        let subtotal = items.iter().map(|i| i.line_total()).sum();
        let item_count = items.iter().map(|i| i.quantity).sum();
        Self {
            cart_id,
            items,
            subtotal,
            item_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Merge two item sets: union by product, summing quantities.
///
/// Pure function behind the session→user cart merge. Idempotence is
/// achieved by the caller emptying the source cart in the same
/// transaction, so a repeated merge unions with an empty set.
pub fn merge_items(
    target: &[(i64, i64)],
    source: &[(i64, i64)],
) -> Vec<(i64, i64)> {
    let mut merged: BTreeMap<i64, i64> = BTreeMap::new();
    for &(product_id, quantity) in target.iter().chain(source) {
        *merged.entry(product_id).or_insert(0) += quantity;
    }
    merged.into_iter().collect()
}
