//! Campus facilities reservation core
//!
//! The availability ledger behind a campus room and parking reservation
//! system: time-window validation, per-resource conflict checking, the
//! reservation status machine, expiry sweeping, and derived availability
//! views for rendering. Durable state lives in an external REST store; this
//! crate keeps its in-memory mirror authoritative and consistent across
//! create, update, cancel and expiry.

pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{CoreError, CoreResult};
pub use ledger::view::{AvailabilityView, DateRange};
pub use ledger::ReservationLedger;
pub use models::{CreateReservation, Reservation, ReservationStatus, ResourceKind, TimeWindow};
pub use services::{ExpirySweeper, ReservationsService};
