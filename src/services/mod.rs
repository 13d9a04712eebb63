//! Reservation commands and background processes

pub mod reservations;
pub mod sweeper;

pub use reservations::{AvailabilitySubscription, ReservationsService};
pub use sweeper::ExpirySweeper;
