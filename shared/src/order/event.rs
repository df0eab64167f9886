//! Tracking events - immutable delivery status records
//!
//! The tracking log is append-only and time-ordered. The most recent
//! event defines the displayed status and progress of an order; the log,
//! not the live feed, is the source of truth for reconnecting viewers.

use serde::{Deserialize, Serialize};

use super::status::TrackingStatus;
use crate::util::now_millis;

/// One append-only delivery tracking record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct TrackingEvent {
    /// Event unique ID
    pub event_id: String,
    /// Order this event belongs to
    pub order_id: i64,
    /// Delivery status recorded by this event
    pub status: TrackingStatus,
    /// Courier-reported location, if any
    pub location: Option<String>,
    /// Free-form note
    pub notes: Option<String>,
    /// Estimated delivery time (Unix milliseconds)
    pub estimated_time: Option<i64>,
    /// Server timestamp (Unix milliseconds) - authoritative ordering key,
    /// ties broken by insertion order
    pub occurred_at: i64,
}

impl TrackingEvent {
    /// Create a new event with a fresh ID and server timestamp
    pub fn new(order_id: i64, status: TrackingStatus) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            order_id,
            status,
            location: None,
            notes: None,
            estimated_time: None,
            occurred_at: now_millis(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_estimated_time(mut self, estimated_time: i64) -> Self {
        self.estimated_time = Some(estimated_time);
        self
    }
}
