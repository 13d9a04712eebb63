//! Data models for the reservation core

pub mod reservation;
pub mod resource;
pub mod window;

// Re-export commonly used types
pub use reservation::{CreateReservation, Reservation, ReservationStatus};
pub use resource::{ReservableResource, ResourceKind};
pub use window::TimeWindow;
