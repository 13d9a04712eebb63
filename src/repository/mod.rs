//! Persistence collaborator for durable reservation state
//!
//! The external facilities server owns durable state; the core mirrors it in
//! the ledger and pushes every committed mutation back through this trait.

pub mod rest;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::CoreResult,
    models::{ReservableResource, Reservation, ResourceKind},
};

/// Logical operations the core requires from the external store.
///
/// `create`/`update` return the persisted record so the server remains free
/// to normalize fields; the core commits what came back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn list_resources(&self, kind: Option<ResourceKind>)
        -> CoreResult<Vec<ReservableResource>>;

    async fn list_reservations(&self, resource_id: Option<String>)
        -> CoreResult<Vec<Reservation>>;

    async fn create_reservation(&self, reservation: &Reservation) -> CoreResult<Reservation>;

    async fn update_reservation(&self, reservation: &Reservation) -> CoreResult<Reservation>;

    async fn delete_reservation(&self, reservation_id: Uuid) -> CoreResult<()>;
}
