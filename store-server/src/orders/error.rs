use thiserror::Error;

use crate::db::repository::RepoError;
use crate::utils::AppError;
use shared::order::OrderStatus;

/// Domain errors of checkout and the order lifecycle
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Product {product_id} not available: {name}")]
    ProductUnavailable { product_id: i64, name: String },

    #[error("Insufficient stock for product {product_id}: {name}")]
    InsufficientStock { product_id: i64, name: String },

    #[error("Illegal transition: {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Stock restitution failed: {0}")]
    RestitutionFailed(String),

    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        OrderError::Repo(RepoError::from(err))
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::EmptyCart => AppError::business_rule("Cart is empty"),
            OrderError::ProductUnavailable { product_id, name } => {
                AppError::business_rule(format!("Product {product_id} not available: {name}"))
            }
            OrderError::InsufficientStock { product_id, name } => {
                AppError::conflict(format!("Insufficient stock for product {product_id}: {name}"))
            }
            OrderError::IllegalTransition { from, to } => {
                AppError::conflict(format!("Illegal transition: {from} -> {to}"))
            }
            OrderError::RestitutionFailed(reason) => {
                AppError::internal(format!("Stock restitution failed: {reason}"))
            }
            OrderError::OrderNotFound(id) => AppError::not_found(format!("Order {id}")),
            OrderError::Forbidden(msg) => AppError::forbidden(msg),
            OrderError::Repo(e) => match e {
                RepoError::NotFound(msg) => AppError::not_found(msg),
                RepoError::Duplicate(msg) => AppError::conflict(msg),
                RepoError::Validation(msg) => AppError::validation(msg),
                RepoError::Database(msg) => AppError::database(msg),
            },
        }
    }
}
