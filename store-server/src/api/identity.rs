//! Caller Identity Extractors
//!
//! Authentication is an upstream concern; requests arrive with the
//! caller already resolved into headers:
//!
//! | Header | Meaning |
//! |--------|---------|
//! | `X-User-Id` | Authenticated customer |
//! | `X-Session-Id` | Anonymous session token |
//! | `X-Operator-Id` | Fulfillment operator (admin console, courier app) |
//!
//! [`Owner`] resolves the cart/order owner (user wins over session).
//! [`Caller`] resolves the acting party; the operator header wins.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::utils::AppError;
use shared::models::CartOwner;
use shared::order::Actor;

const USER_HEADER: &str = "x-user-id";
const SESSION_HEADER: &str = "x-session-id";
const OPERATOR_HEADER: &str = "x-operator-id";

/// Cart/order owner identity
#[derive(Debug, Clone)]
pub struct Owner(pub CartOwner);

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = header_value(parts, USER_HEADER)? {
            return Ok(Owner(CartOwner::User(user)));
        }
        if let Some(token) = header_value(parts, SESSION_HEADER)? {
            return Ok(Owner(CartOwner::Session(token)));
        }
        Err(AppError::invalid(
            "Missing X-User-Id or X-Session-Id header",
        ))
    }
}

/// Acting party for order mutations
#[derive(Debug, Clone)]
pub struct Caller(pub Actor);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = header_value(parts, OPERATOR_HEADER)? {
            return Ok(Caller(Actor::Operator { id }));
        }
        let Owner(owner) = Owner::from_request_parts(parts, state).await?;
        Ok(Caller(Actor::Customer { owner: owner.key() }))
    }
}

fn header_value(parts: &Parts, name: &str) -> Result<Option<String>, AppError> {
    match parts.headers.get(name) {
        None => Ok(None),
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| AppError::invalid(format!("Malformed {name} header")))?
                .trim();
            if value.is_empty() {
                Ok(None)
            } else {
                Ok(Some(value.to_string()))
            }
        }
    }
}
