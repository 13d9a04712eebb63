//! Reservation model and status machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::window::TimeWindow;

// ---------------------------------------------------------------------------
// ReservationStatus
// ---------------------------------------------------------------------------

/// Reservation lifecycle status.
///
/// ```text
/// PENDING   --confirm--> CONFIRMED
/// PENDING   --cancel---> CANCELLED
/// PENDING   --expire---> EXPIRED     (window.end <= now)
/// CONFIRMED --cancel---> CANCELLED
/// CONFIRMED --expire---> COMPLETED   (window.end <= now)
/// ```
///
/// Cancelled, Expired and Completed are terminal: the record is retained for
/// history but never transitions again and never counts toward conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Expired,
}

impl ReservationStatus {
    /// Active reservations hold their slot and count toward overlap checks
    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Expired => "expired",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

/// A booking of one resource by one user over one time window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    /// Resource held by this reservation
    pub resource_id: String,
    /// Owning user (external identity)
    pub user_id: i32,
    pub window: TimeWindow,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create reservation request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReservation {
    pub resource_id: String,
    pub user_id: i32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Caller-supplied id, so a timed-out create can be retried without
    /// double-booking. Generated when absent.
    pub reservation_id: Option<Uuid>,
    /// Create directly in Confirmed status instead of Pending
    #[serde(default)]
    pub confirmed: bool,
}
