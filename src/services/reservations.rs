//! Reservation command service
//!
//! Single logical owner of the [`ReservationLedger`]. Every command takes
//! the ledger lock for the whole check + persist + commit unit, so two
//! conflicting reserves racing past an availability check cannot both win:
//! the first committer holds the slot, the second observes `SlotConflict`.
//!
//! The in-memory mutation and the external store write form one logical
//! unit. When the store write fails, the speculative ledger mutation is
//! rolled back and the error surfaces as a retryable `Persistence` failure;
//! the resource's availability is then exactly as it was before the call.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{watch, Mutex};
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use crate::{
    config::PolicyConfig,
    error::{CoreError, CoreResult},
    ledger::{
        view::{AvailabilityView, DateRange},
        ReservationLedger,
    },
    models::{CreateReservation, Reservation, TimeWindow},
    repository::ReservationStore,
};

/// A pulled availability snapshot plus a change signal for re-pulling
pub struct AvailabilitySubscription {
    pub view: AvailabilityView,
    changes: watch::Receiver<u64>,
}

impl AvailabilitySubscription {
    /// Wait until the ledger has changed since the snapshot was taken.
    /// Returns `false` when the service has shut down.
    pub async fn changed(&mut self) -> bool {
        self.changes.changed().await.is_ok()
    }

    pub fn into_stream(self) -> WatchStream<u64> {
        WatchStream::new(self.changes)
    }
}

#[derive(Clone)]
pub struct ReservationsService {
    inner: Arc<Inner>,
}

struct Inner {
    ledger: Mutex<ReservationLedger>,
    store: Arc<dyn ReservationStore>,
    policy: PolicyConfig,
    /// Monotonic ledger generation, bumped after every committed mutation
    generation: watch::Sender<u64>,
}

impl ReservationsService {
    /// Hydrate the ledger from the external store and wrap it in a service.
    ///
    /// Records that reference unknown resources or conflict with an
    /// already-loaded hold indicate server-side inconsistency; they are
    /// logged and left out of availability rather than failing startup.
    pub async fn bootstrap(
        store: Arc<dyn ReservationStore>,
        policy: PolicyConfig,
    ) -> CoreResult<Self> {
        let mut ledger = ReservationLedger::new();

        let resources = store.list_resources(None).await?;
        tracing::info!(count = resources.len(), "Loaded resources from backend");
        for resource in resources {
            ledger.register_resource(resource);
        }

        let reservations = store.list_reservations(None).await?;
        tracing::info!(count = reservations.len(), "Loaded reservations from backend");
        for reservation in reservations {
            let id = reservation.id;
            if let Err(e) = ledger.load_reservation(reservation) {
                tracing::warn!(reservation_id = %id, error = %e, "Skipping inconsistent reservation");
            }
        }

        let (generation, _) = watch::channel(0);
        Ok(Self {
            inner: Arc::new(Inner {
                ledger: Mutex::new(ledger),
                store,
                policy,
                generation,
            }),
        })
    }

    fn validate_policy(&self, window: &TimeWindow) -> CoreResult<()> {
        let minutes = window.duration_minutes();
        let policy = &self.inner.policy;
        if policy.min_duration_minutes > 0 && minutes < policy.min_duration_minutes {
            return Err(CoreError::InvalidWindow(format!(
                "duration {}min is below the {}min minimum",
                minutes, policy.min_duration_minutes
            )));
        }
        if policy.max_duration_minutes > 0 && minutes > policy.max_duration_minutes {
            return Err(CoreError::InvalidWindow(format!(
                "duration {}min exceeds the {}min maximum",
                minutes, policy.max_duration_minutes
            )));
        }
        Ok(())
    }

    fn publish_change(&self) {
        self.inner.generation.send_modify(|g| *g += 1);
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Create a reservation: availability check, durable write and ledger
    /// commit under one critical section.
    pub async fn reserve(&self, req: CreateReservation) -> CoreResult<Reservation> {
        let window = TimeWindow::new(req.start, req.end)?;
        self.validate_policy(&window)?;

        let mut ledger = self.inner.ledger.lock().await;
        // Pre-image for rollback when this is an idempotent retry of an
        // already-registered id.
        let pre_image = req
            .reservation_id
            .and_then(|id| ledger.reservation(id).cloned());
        let reservation = ledger.reserve(&req, Utc::now())?;

        if let Err(e) = self.inner.store.create_reservation(&reservation).await {
            match pre_image {
                Some(image) => ledger.restore(image),
                None => ledger.evict(reservation.id),
            }
            tracing::warn!(reservation_id = %reservation.id, error = %e, "Reserve rolled back");
            return Err(e);
        }

        tracing::info!(
            reservation_id = %reservation.id,
            resource_id = %reservation.resource_id,
            user_id = reservation.user_id,
            window = %reservation.window,
            "Reservation created"
        );
        self.publish_change();
        Ok(reservation)
    }

    /// Cancel a reservation. Idempotent: unknown and already-terminal ids
    /// return `None` without touching the store.
    pub async fn cancel(
        &self,
        reservation_id: Uuid,
        requested_by: i32,
        admin_override: bool,
    ) -> CoreResult<Option<Reservation>> {
        let mut ledger = self.inner.ledger.lock().await;
        let pre_image = ledger.reservation(reservation_id).cloned();
        let Some(cancelled) =
            ledger.cancel(reservation_id, requested_by, admin_override, Utc::now())?
        else {
            return Ok(None);
        };

        if let Err(e) = self.inner.store.update_reservation(&cancelled).await {
            ledger.restore(pre_image.expect("cancel returned Some, record existed"));
            tracing::warn!(reservation_id = %reservation_id, error = %e, "Cancel rolled back");
            return Err(e);
        }

        tracing::info!(reservation_id = %reservation_id, "Reservation cancelled");
        self.publish_change();
        Ok(Some(cancelled))
    }

    /// Move a reservation to a new window, all-or-nothing
    pub async fn update(
        &self,
        reservation_id: Uuid,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
        requested_by: i32,
        admin_override: bool,
    ) -> CoreResult<Reservation> {
        let new_window = TimeWindow::new(new_start, new_end)?;
        self.validate_policy(&new_window)?;

        let mut ledger = self.inner.ledger.lock().await;
        let pre_image = ledger
            .reservation(reservation_id)
            .cloned()
            .ok_or(CoreError::NotFound(reservation_id))?;
        let updated = ledger.update(
            reservation_id,
            new_window,
            requested_by,
            admin_override,
            Utc::now(),
        )?;

        if let Err(e) = self.inner.store.update_reservation(&updated).await {
            ledger.restore(pre_image);
            tracing::warn!(reservation_id = %reservation_id, error = %e, "Update rolled back");
            return Err(e);
        }

        tracing::info!(
            reservation_id = %reservation_id,
            window = %updated.window,
            "Reservation window updated"
        );
        self.publish_change();
        Ok(updated)
    }

    /// Confirm a pending reservation
    pub async fn confirm(&self, reservation_id: Uuid) -> CoreResult<Reservation> {
        let mut ledger = self.inner.ledger.lock().await;
        let pre_image = ledger
            .reservation(reservation_id)
            .cloned()
            .ok_or(CoreError::NotFound(reservation_id))?;
        let confirmed = ledger.confirm(reservation_id, Utc::now())?;

        if let Err(e) = self.inner.store.update_reservation(&confirmed).await {
            ledger.restore(pre_image);
            tracing::warn!(reservation_id = %reservation_id, error = %e, "Confirm rolled back");
            return Err(e);
        }

        tracing::info!(reservation_id = %reservation_id, "Reservation confirmed");
        self.publish_change();
        Ok(confirmed)
    }

    /// Retire reservations whose window has elapsed.
    ///
    /// Each retired record is persisted individually; a failed write rolls
    /// that record back so the next sweep retries it. Returns the ids that
    /// were durably retired.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<Uuid>> {
        let mut ledger = self.inner.ledger.lock().await;
        let swept = ledger.sweep_expired(now);
        if swept.is_empty() {
            return Ok(Vec::new());
        }

        let mut retired = Vec::with_capacity(swept.len());
        for entry in swept {
            match self.inner.store.update_reservation(&entry.after).await {
                Ok(_) => retired.push(entry.after.id),
                Err(e) => {
                    tracing::warn!(
                        reservation_id = %entry.after.id,
                        error = %e,
                        "Sweep write failed, will retry next tick"
                    );
                    ledger.restore(entry.before);
                }
            }
        }

        if !retired.is_empty() {
            self.publish_change();
        }
        Ok(retired)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Availability snapshot for one resource over a date range
    pub async fn availability(
        &self,
        resource_id: &str,
        range: DateRange,
    ) -> CoreResult<AvailabilityView> {
        let ledger = self.inner.ledger.lock().await;
        AvailabilityView::build(&ledger, resource_id, range, Utc::now())
    }

    /// Snapshot plus a change signal; the caller re-pulls `availability`
    /// whenever the signal fires
    pub async fn subscribe(
        &self,
        resource_id: &str,
        range: DateRange,
    ) -> CoreResult<AvailabilitySubscription> {
        // Receiver before snapshot: a watch receiver treats values sent
        // before subscribe() as already seen, so a commit landing between
        // the snapshot and a later subscribe() would never be signaled.
        // The reverse order can only produce a spurious wake, and the
        // caller re-pulls on every wake anyway.
        let changes = self.inner.generation.subscribe();
        let view = self.availability(resource_id, range).await?;
        Ok(AvailabilitySubscription { view, changes })
    }

    /// Whether a window is currently free on a resource
    pub async fn is_free(&self, resource_id: &str, window: &TimeWindow) -> CoreResult<bool> {
        let ledger = self.inner.ledger.lock().await;
        Ok(ledger.availability(resource_id)?.is_free(window))
    }

    /// First free slot of `duration_minutes` at or after `from`, within the
    /// configured look-ahead horizon
    pub async fn next_free_slot_after(
        &self,
        resource_id: &str,
        from: DateTime<Utc>,
        duration_minutes: i64,
    ) -> CoreResult<Option<TimeWindow>> {
        let horizon = Duration::days(self.inner.policy.search_horizon_days);
        let ledger = self.inner.ledger.lock().await;
        ledger.next_free_slot_after(resource_id, from, Duration::minutes(duration_minutes), horizon)
    }

    /// Current record for a reservation id
    pub async fn reservation(&self, reservation_id: Uuid) -> Option<Reservation> {
        let ledger = self.inner.ledger.lock().await;
        ledger.reservation(reservation_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReservableResource, ResourceKind};
    use crate::repository::MockReservationStore;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, hour, min, 0).unwrap()
    }

    fn room() -> ReservableResource {
        ReservableResource {
            id: "R1".to_string(),
            kind: ResourceKind::Room,
            name: None,
            capacity: Some(8),
            vehicle_type: None,
        }
    }

    fn request(h1: u32, m1: u32, h2: u32, m2: u32) -> CreateReservation {
        CreateReservation {
            resource_id: "R1".to_string(),
            user_id: 1,
            start: at(h1, m1),
            end: at(h2, m2),
            reservation_id: None,
            confirmed: false,
        }
    }

    fn base_mock() -> MockReservationStore {
        let mut store = MockReservationStore::new();
        store
            .expect_list_resources()
            .returning(|_| Ok(vec![room()]));
        store.expect_list_reservations().returning(|_| Ok(Vec::new()));
        store
    }

    async fn service(store: MockReservationStore) -> ReservationsService {
        ReservationsService::bootstrap(Arc::new(store), PolicyConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_reserve_persists_and_commits() {
        let mut store = base_mock();
        store
            .expect_create_reservation()
            .times(1)
            .returning(|r| Ok(r.clone()));
        let service = service(store).await;

        let reservation = service.reserve(request(9, 0, 10, 0)).await.unwrap();
        let window = reservation.window;
        assert!(!service.is_free("R1", &window).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back_reserve() {
        let mut store = base_mock();
        store
            .expect_create_reservation()
            .returning(|_| Err(CoreError::Persistence("backend down".to_string())));
        let service = service(store).await;

        let err = service.reserve(request(9, 0, 10, 0)).await.unwrap_err();
        assert!(err.is_retryable());

        // Availability is exactly as before the failed call.
        let window = TimeWindow::new(at(9, 0), at(10, 0)).unwrap();
        assert!(service.is_free("R1", &window).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back_update() {
        let mut store = base_mock();
        store
            .expect_create_reservation()
            .returning(|r| Ok(r.clone()));
        store
            .expect_update_reservation()
            .returning(|_| Err(CoreError::Persistence("backend down".to_string())));
        let service = service(store).await;

        let reservation = service.reserve(request(9, 0, 10, 0)).await.unwrap();
        let err = service
            .update(reservation.id, at(13, 0), at(14, 0), 1, false)
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        // Old window still held, new window still free.
        let old = TimeWindow::new(at(9, 0), at(10, 0)).unwrap();
        let new = TimeWindow::new(at(13, 0), at(14, 0)).unwrap();
        assert!(!service.is_free("R1", &old).await.unwrap());
        assert!(service.is_free("R1", &new).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_unknown_id_skips_store() {
        // No update_reservation expectation: calling it would fail the test.
        let store = base_mock();
        let service = service(store).await;

        let outcome = service.cancel(Uuid::new_v4(), 1, false).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_policy_rejects_short_window() {
        let store = base_mock();
        let service = service(store).await;

        let err = service.reserve(request(9, 0, 9, 5)).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidWindow(_)));
    }

    #[tokio::test]
    async fn test_subscription_signals_on_commit() {
        let mut store = base_mock();
        store
            .expect_create_reservation()
            .returning(|r| Ok(r.clone()));
        let service = service(store).await;

        let range = DateRange::single_day(chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        let mut subscription = service.subscribe("R1", range).await.unwrap();
        let stale_version = subscription.view.version;

        service.reserve(request(9, 0, 10, 0)).await.unwrap();
        assert!(subscription.changed().await);

        let fresh = service.availability("R1", range).await.unwrap();
        assert!(fresh.version > stale_version);
    }

    #[tokio::test]
    async fn test_subscribe_racing_commit_is_signaled() {
        let mut store = base_mock();
        store
            .expect_create_reservation()
            .returning(|r| Ok(r.clone()));
        store
            .expect_update_reservation()
            .returning(|r| Ok(r.clone()));
        let service = service(store).await;
        let range = DateRange::single_day(chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());

        for _ in 0..50 {
            let svc = service.clone();
            let mutator =
                tokio::spawn(async move { svc.reserve(request(9, 0, 10, 0)).await.unwrap().id });
            let mut subscription = service.subscribe("R1", range).await.unwrap();
            let id = mutator.await.unwrap();

            // A commit landing before the snapshot is already part of the
            // view; one landing after it must fire the change signal, even
            // when it raced the subscribe call itself.
            let fresh = service.availability("R1", range).await.unwrap();
            if fresh.version > subscription.view.version {
                tokio::time::timeout(
                    std::time::Duration::from_secs(1),
                    subscription.changed(),
                )
                .await
                .expect("commit after snapshot must signal the subscription");
            }

            service.cancel(id, 1, false).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_sweep_rolls_back_failed_writes() {
        let mut store = base_mock();
        store
            .expect_create_reservation()
            .returning(|r| Ok(r.clone()));
        store
            .expect_update_reservation()
            .returning(|_| Err(CoreError::Persistence("backend down".to_string())));
        let service = service(store).await;

        let reservation = service.reserve(request(9, 0, 10, 0)).await.unwrap();
        let retired = service.sweep_expired(at(10, 1)).await.unwrap();
        assert!(retired.is_empty());

        // The record stays active and is retried by the next sweep.
        let current = service.reservation(reservation.id).await.unwrap();
        assert!(current.status.is_active());
    }
}
