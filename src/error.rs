//! Error types for the reservation core

use thiserror::Error;
use uuid::Uuid;

use crate::models::reservation::ReservationStatus;

/// Main error type for reservation operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Slot conflict on resource {resource_id}: window overlaps reservation {conflicting}")]
    SlotConflict {
        resource_id: String,
        conflicting: Uuid,
    },

    #[error("Reservation {0} not found")]
    NotFound(Uuid),

    #[error("User {user_id} is not the owner of reservation {reservation_id}")]
    NotOwner {
        reservation_id: Uuid,
        user_id: i32,
    },

    #[error("Invalid status transition: cannot {action} a {from} reservation")]
    InvalidTransition {
        from: ReservationStatus,
        action: &'static str,
    },

    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl CoreError {
    /// Whether the caller may safely retry the failed operation.
    ///
    /// Only persistence failures are retryable; every other variant reports
    /// a definite outcome that a retry would not change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Persistence(_))
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::Persistence(e.to_string())
    }
}

/// Result type alias for reservation core operations
pub type CoreResult<T> = Result<T, CoreError>;
