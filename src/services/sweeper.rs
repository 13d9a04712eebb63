//! Expiry sweeper
//!
//! Interval-driven caller of the ledger's expiry sweep. Authoritative for
//! retiring elapsed reservations: UI collaborators only reflect the result,
//! they never delete based on their own clocks. Overlapping or repeated
//! invocations are safe because the sweep itself is idempotent and
//! serialized by the service.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::reservations::ReservationsService;

pub struct ExpirySweeper {
    service: ReservationsService,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(service: ReservationsService, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Sweep until the shutdown signal fires. A failed sweep is logged and
    /// retried on the next tick, bounding staleness to the interval.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.service.sweep_expired(Utc::now()).await {
                        Ok(retired) if retired.is_empty() => {}
                        Ok(retired) => {
                            tracing::info!(count = retired.len(), "Retired elapsed reservations");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Expiry sweep failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Expiry sweeper stopping");
                    break;
                }
            }
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::models::{CreateReservation, ReservableResource, ResourceKind};
    use crate::repository::MockReservationStore;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sweeper_retires_and_stops() {
        let mut store = MockReservationStore::new();
        store.expect_list_resources().returning(|_| {
            Ok(vec![ReservableResource {
                id: "P1".to_string(),
                kind: ResourceKind::ParkingSpace,
                name: None,
                capacity: None,
                vehicle_type: Some("car".to_string()),
            }])
        });
        store.expect_list_reservations().returning(|_| Ok(Vec::new()));
        store.expect_create_reservation().returning(|r| Ok(r.clone()));
        store.expect_update_reservation().returning(|r| Ok(r.clone()));

        let service = ReservationsService::bootstrap(Arc::new(store), PolicyConfig::default())
            .await
            .unwrap();

        // A reservation already elapsed by the time the sweeper ticks.
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 1, 1, 10, 0, 0).unwrap();
        let reservation = service
            .reserve(CreateReservation {
                resource_id: "P1".to_string(),
                user_id: 7,
                start,
                end,
                reservation_id: None,
                confirmed: false,
            })
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = ExpirySweeper::new(service.clone(), Duration::from_millis(10));
        let handle = sweeper.spawn(shutdown_rx);

        // First tick fires immediately; give it a moment to run.
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let current = service.reservation(reservation.id).await.unwrap();
        assert!(current.status.is_terminal());
    }
}
