//! Reservation ledger
//!
//! The authoritative in-core record of all reservations plus per-resource
//! availability. All mutations go through the ledger; the UI-facing
//! availability view is always a derived, disposable projection.
//!
//! The ledger is a plain synchronous structure. Serialization of concurrent
//! commands (and of the check-then-commit unit around the external store
//! write) is the job of [`crate::services::reservations::ReservationsService`],
//! which owns the ledger behind a single async mutex.

pub mod availability;
pub mod view;

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    error::{CoreError, CoreResult},
    models::{
        reservation::{CreateReservation, Reservation, ReservationStatus},
        resource::ReservableResource,
        window::TimeWindow,
    },
};

use availability::ResourceAvailability;

/// Before/after images of a reservation retired by an expiry sweep
#[derive(Debug, Clone)]
pub struct SweptReservation {
    pub before: Reservation,
    pub after: Reservation,
}

/// Single source of truth for reservations within the core
#[derive(Debug, Default)]
pub struct ReservationLedger {
    resources: HashMap<String, ReservableResource>,
    availability: HashMap<String, ResourceAvailability>,
    reservations: HashMap<Uuid, Reservation>,
    /// Per-resource version counters, bumped on every mutation; consumed by
    /// view staleness checks
    versions: HashMap<String, u64>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Registry access
    // -----------------------------------------------------------------------

    /// Register a resource published by the external facilities store
    pub fn register_resource(&mut self, resource: ReservableResource) {
        self.availability
            .entry(resource.id.clone())
            .or_default();
        self.versions.entry(resource.id.clone()).or_insert(0);
        self.resources.insert(resource.id.clone(), resource);
    }

    pub fn resource(&self, resource_id: &str) -> Option<&ReservableResource> {
        self.resources.get(resource_id)
    }

    pub fn reservation(&self, reservation_id: Uuid) -> Option<&Reservation> {
        self.reservations.get(&reservation_id)
    }

    pub fn availability(&self, resource_id: &str) -> CoreResult<&ResourceAvailability> {
        self.availability
            .get(resource_id)
            .ok_or_else(|| CoreError::UnknownResource(resource_id.to_string()))
    }

    pub fn version(&self, resource_id: &str) -> u64 {
        self.versions.get(resource_id).copied().unwrap_or(0)
    }

    fn bump_version(&mut self, resource_id: &str) {
        *self.versions.entry(resource_id.to_string()).or_insert(0) += 1;
    }

    /// Load an existing reservation during hydration from the external
    /// store. Active records claim their slot; records that conflict with an
    /// already-loaded hold are rejected so the caller can flag the
    /// inconsistency.
    pub fn load_reservation(&mut self, reservation: Reservation) -> CoreResult<()> {
        if !self.resources.contains_key(&reservation.resource_id) {
            return Err(CoreError::UnknownResource(reservation.resource_id));
        }
        if reservation.status.is_active() {
            let avail = self
                .availability
                .entry(reservation.resource_id.clone())
                .or_default();
            avail
                .insert(reservation.id, reservation.window)
                .map_err(|conflicting| CoreError::SlotConflict {
                    resource_id: reservation.resource_id.clone(),
                    conflicting,
                })?;
        }
        self.reservations.insert(reservation.id, reservation);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Create a reservation, claiming its slot.
    ///
    /// Idempotent for caller-supplied ids: re-submitting an id already
    /// registered with the same resource, user and window returns the
    /// existing record unchanged.
    pub fn reserve(&mut self, req: &CreateReservation, now: DateTime<Utc>) -> CoreResult<Reservation> {
        let window = TimeWindow::new(req.start, req.end)?;

        if let Some(id) = req.reservation_id {
            if let Some(existing) = self.reservations.get(&id) {
                // Replay only absorbs a live, identical booking; a reused id
                // whose reservation has since terminated (or carries a
                // different payload) is a caller error, not a retry.
                if existing.status.is_active()
                    && existing.resource_id == req.resource_id
                    && existing.user_id == req.user_id
                    && existing.window == window
                {
                    return Ok(existing.clone());
                }
                return Err(CoreError::InvalidTransition {
                    from: existing.status,
                    action: "recreate",
                });
            }
        }

        if !self.resources.contains_key(&req.resource_id) {
            return Err(CoreError::UnknownResource(req.resource_id.clone()));
        }

        let id = req.reservation_id.unwrap_or_else(Uuid::new_v4);
        let avail = self.availability.entry(req.resource_id.clone()).or_default();
        avail
            .insert(id, window)
            .map_err(|conflicting| CoreError::SlotConflict {
                resource_id: req.resource_id.clone(),
                conflicting,
            })?;

        let reservation = Reservation {
            id,
            resource_id: req.resource_id.clone(),
            user_id: req.user_id,
            window,
            status: if req.confirmed {
                ReservationStatus::Confirmed
            } else {
                ReservationStatus::Pending
            },
            created_at: now,
            updated_at: now,
        };
        self.reservations.insert(id, reservation.clone());
        self.bump_version(&req.resource_id);
        Ok(reservation)
    }

    /// Cancel a reservation, freeing its slot.
    ///
    /// Idempotent: an unknown or already-terminal id is a no-op returning
    /// `None`, so cancels can be retried safely. Ownership is enforced
    /// unless `admin_override` is set.
    pub fn cancel(
        &mut self,
        reservation_id: Uuid,
        requested_by: i32,
        admin_override: bool,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<Reservation>> {
        let reservation = match self.reservations.get_mut(&reservation_id) {
            Some(r) => r,
            None => return Ok(None),
        };
        if reservation.status.is_terminal() {
            return Ok(None);
        }
        if !admin_override && reservation.user_id != requested_by {
            return Err(CoreError::NotOwner {
                reservation_id,
                user_id: requested_by,
            });
        }

        reservation.status = ReservationStatus::Cancelled;
        reservation.updated_at = now;
        let updated = reservation.clone();

        if let Some(avail) = self.availability.get_mut(&updated.resource_id) {
            avail.remove(reservation_id);
        }
        self.bump_version(&updated.resource_id);
        Ok(Some(updated))
    }

    /// Move a reservation to a new window, all-or-nothing.
    ///
    /// When the new window conflicts, the original hold is restored before
    /// returning: no other operation can ever observe the old slot freed
    /// without the new one secured.
    pub fn update(
        &mut self,
        reservation_id: Uuid,
        new_window: TimeWindow,
        requested_by: i32,
        admin_override: bool,
        now: DateTime<Utc>,
    ) -> CoreResult<Reservation> {
        let reservation = self
            .reservations
            .get(&reservation_id)
            .ok_or(CoreError::NotFound(reservation_id))?;
        if reservation.status.is_terminal() {
            return Err(CoreError::InvalidTransition {
                from: reservation.status,
                action: "update",
            });
        }
        if !admin_override && reservation.user_id != requested_by {
            return Err(CoreError::NotOwner {
                reservation_id,
                user_id: requested_by,
            });
        }

        let resource_id = reservation.resource_id.clone();
        let old_window = reservation.window;
        let avail = self
            .availability
            .get_mut(&resource_id)
            .ok_or_else(|| CoreError::UnknownResource(resource_id.clone()))?;

        avail.remove(reservation_id);
        if let Err(conflicting) = avail.insert(reservation_id, new_window) {
            // Roll back: the old slot was ours, re-claiming it cannot fail.
            let _ = avail.insert(reservation_id, old_window);
            return Err(CoreError::SlotConflict {
                resource_id,
                conflicting,
            });
        }

        let reservation = self
            .reservations
            .get_mut(&reservation_id)
            .expect("reservation checked above");
        reservation.window = new_window;
        reservation.updated_at = now;
        let updated = reservation.clone();
        self.bump_version(&resource_id);
        Ok(updated)
    }

    /// Confirm a pending reservation
    pub fn confirm(&mut self, reservation_id: Uuid, now: DateTime<Utc>) -> CoreResult<Reservation> {
        let reservation = self
            .reservations
            .get_mut(&reservation_id)
            .ok_or(CoreError::NotFound(reservation_id))?;
        if reservation.status != ReservationStatus::Pending {
            return Err(CoreError::InvalidTransition {
                from: reservation.status,
                action: "confirm",
            });
        }
        reservation.status = ReservationStatus::Confirmed;
        reservation.updated_at = now;
        let updated = reservation.clone();
        self.bump_version(&updated.resource_id);
        Ok(updated)
    }

    /// Retire every active reservation whose window has fully elapsed:
    /// Pending becomes Expired, Confirmed becomes Completed. Records are
    /// retained for history; only their slot is released. Safe to call
    /// repeatedly: a second sweep finds nothing left to retire.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<SweptReservation> {
        let due: Vec<Uuid> = self
            .reservations
            .values()
            .filter(|r| r.status.is_active() && r.window.has_elapsed(now))
            .map(|r| r.id)
            .collect();

        let mut swept = Vec::with_capacity(due.len());
        for id in due {
            let reservation = self.reservations.get_mut(&id).expect("id collected above");
            let before = reservation.clone();
            reservation.status = match reservation.status {
                ReservationStatus::Pending => ReservationStatus::Expired,
                ReservationStatus::Confirmed => ReservationStatus::Completed,
                other => other,
            };
            reservation.updated_at = now;
            let after = reservation.clone();

            if let Some(avail) = self.availability.get_mut(&after.resource_id) {
                avail.remove(id);
            }
            self.bump_version(&after.resource_id);
            swept.push(SweptReservation { before, after });
        }
        swept
    }

    /// Remove a record that never acquired durable backing (its external
    /// create failed). The slot it speculatively held is released.
    pub fn evict(&mut self, reservation_id: Uuid) {
        if let Some(reservation) = self.reservations.remove(&reservation_id) {
            if let Some(avail) = self.availability.get_mut(&reservation.resource_id) {
                avail.remove(reservation_id);
            }
            self.bump_version(&reservation.resource_id);
        }
    }

    /// Re-apply a previously captured reservation image, reversing a
    /// speculative mutation whose external write failed. The caller holds
    /// the ledger across the whole failed operation, so re-claiming the
    /// restored slot cannot race.
    pub fn restore(&mut self, reservation: Reservation) {
        let resource_id = reservation.resource_id.clone();
        if let Some(avail) = self.availability.get_mut(&resource_id) {
            avail.remove(reservation.id);
            if reservation.status.is_active() {
                let _ = avail.insert(reservation.id, reservation.window);
            }
        }
        self.reservations.insert(reservation.id, reservation);
        self.bump_version(&resource_id);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// First free slot of `duration` on the resource at or after `from`,
    /// within `horizon`
    pub fn next_free_slot_after(
        &self,
        resource_id: &str,
        from: DateTime<Utc>,
        duration: Duration,
        horizon: Duration,
    ) -> CoreResult<Option<TimeWindow>> {
        Ok(self
            .availability(resource_id)?
            .next_free_slot_after(from, duration, horizon))
    }
}
