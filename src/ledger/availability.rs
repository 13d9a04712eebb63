//! Per-resource availability tracking
//!
//! Keeps the active (pending/confirmed) holds of a single resource sorted by
//! start time and answers overlap and free-slot queries against them.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::window::TimeWindow;

/// An active reservation's claim on the resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hold {
    pub reservation_id: Uuid,
    pub window: TimeWindow,
}

/// Availability state for one reservable resource.
///
/// Invariant: holds are sorted by window start and pairwise non-overlapping.
#[derive(Debug, Clone, Default)]
pub struct ResourceAvailability {
    holds: Vec<Hold>,
}

impl ResourceAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    /// First hold overlapping `window`, if any
    pub fn conflicting_hold(&self, window: &TimeWindow) -> Option<&Hold> {
        self.holds.iter().find(|h| h.window.overlaps(window))
    }

    pub fn is_free(&self, window: &TimeWindow) -> bool {
        self.conflicting_hold(window).is_none()
    }

    /// Insert a hold, maintaining sort order.
    ///
    /// Returns the id of the conflicting reservation when the window is not
    /// free; the hold list is unchanged in that case.
    pub fn insert(&mut self, reservation_id: Uuid, window: TimeWindow) -> Result<(), Uuid> {
        if let Some(conflict) = self.conflicting_hold(&window) {
            return Err(conflict.reservation_id);
        }
        let pos = self
            .holds
            .partition_point(|h| h.window.start() < window.start());
        self.holds.insert(
            pos,
            Hold {
                reservation_id,
                window,
            },
        );
        Ok(())
    }

    /// Remove a hold. No-op when the id is not present, so a retried cancel
    /// stays idempotent.
    pub fn remove(&mut self, reservation_id: Uuid) -> bool {
        let before = self.holds.len();
        self.holds.retain(|h| h.reservation_id != reservation_id);
        self.holds.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.holds.is_empty()
    }

    pub fn holds(&self) -> &[Hold] {
        &self.holds
    }

    /// First window of length `duration` starting at or after `from` that
    /// fits in a gap between holds, searching no further than
    /// `from + horizon`.
    ///
    /// Handles the gap before the first hold, gaps between consecutive
    /// holds, the gap after the last hold, and the empty resource (whole
    /// horizon free).
    pub fn next_free_slot_after(
        &self,
        from: DateTime<Utc>,
        duration: Duration,
        horizon: Duration,
    ) -> Option<TimeWindow> {
        if duration <= Duration::zero() {
            return None;
        }
        let horizon_end = from + horizon;
        let mut cursor = from;

        for hold in &self.holds {
            // Hold entirely before the cursor: no gap to consider.
            if hold.window.end() <= cursor {
                continue;
            }
            if hold.window.start() - cursor >= duration && cursor + duration <= horizon_end {
                // Gap [cursor, hold.start) fits the requested duration.
                return TimeWindow::new(cursor, cursor + duration).ok();
            }
            cursor = cursor.max(hold.window.end());
            if cursor >= horizon_end {
                return None;
            }
        }

        if cursor + duration <= horizon_end {
            return TimeWindow::new(cursor, cursor + duration).ok();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, hour, min, 0).unwrap()
    }

    fn window(h1: u32, m1: u32, h2: u32, m2: u32) -> TimeWindow {
        TimeWindow::new(at(h1, m1), at(h2, m2)).unwrap()
    }

    fn horizon() -> Duration {
        Duration::days(14)
    }

    #[test]
    fn test_insert_rejects_overlap() {
        let mut avail = ResourceAvailability::new();
        let first = Uuid::new_v4();
        avail.insert(first, window(9, 0, 10, 0)).unwrap();

        let err = avail
            .insert(Uuid::new_v4(), window(9, 30, 10, 30))
            .unwrap_err();
        assert_eq!(err, first);
        assert_eq!(avail.holds().len(), 1);
    }

    #[test]
    fn test_insert_touching_windows() {
        let mut avail = ResourceAvailability::new();
        avail.insert(Uuid::new_v4(), window(10, 0, 11, 0)).unwrap();
        avail.insert(Uuid::new_v4(), window(11, 0, 12, 0)).unwrap();
        avail.insert(Uuid::new_v4(), window(9, 0, 10, 0)).unwrap();
        assert_eq!(avail.holds().len(), 3);
        // Sorted by start regardless of insertion order.
        assert_eq!(avail.holds()[0].window, window(9, 0, 10, 0));
        assert_eq!(avail.holds()[2].window, window(11, 0, 12, 0));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut avail = ResourceAvailability::new();
        let id = Uuid::new_v4();
        avail.insert(id, window(9, 0, 10, 0)).unwrap();

        assert!(avail.remove(id));
        assert!(!avail.remove(id));
        assert!(!avail.remove(Uuid::new_v4()));
        assert!(avail.is_empty());
    }

    #[test]
    fn test_next_free_slot_empty_resource() {
        let avail = ResourceAvailability::new();
        let slot = avail
            .next_free_slot_after(at(8, 0), Duration::minutes(60), horizon())
            .unwrap();
        assert_eq!(slot, window(8, 0, 9, 0));
    }

    #[test]
    fn test_next_free_slot_before_first_hold() {
        let mut avail = ResourceAvailability::new();
        avail.insert(Uuid::new_v4(), window(10, 0, 11, 0)).unwrap();

        let slot = avail
            .next_free_slot_after(at(8, 0), Duration::minutes(60), horizon())
            .unwrap();
        assert_eq!(slot, window(8, 0, 9, 0));
    }

    #[test]
    fn test_next_free_slot_between_holds() {
        let mut avail = ResourceAvailability::new();
        avail.insert(Uuid::new_v4(), window(8, 0, 9, 0)).unwrap();
        avail.insert(Uuid::new_v4(), window(10, 0, 11, 0)).unwrap();

        // 30 minutes fits in the 9:00-10:00 gap.
        let slot = avail
            .next_free_slot_after(at(8, 0), Duration::minutes(30), horizon())
            .unwrap();
        assert_eq!(slot, window(9, 0, 9, 30));
    }

    #[test]
    fn test_next_free_slot_after_last_hold() {
        let mut avail = ResourceAvailability::new();
        avail.insert(Uuid::new_v4(), window(8, 0, 9, 30)).unwrap();
        avail.insert(Uuid::new_v4(), window(9, 30, 11, 0)).unwrap();

        // 90 minutes does not fit before or between, only after the last hold.
        let slot = avail
            .next_free_slot_after(at(8, 0), Duration::minutes(90), horizon())
            .unwrap();
        assert_eq!(slot, window(11, 0, 12, 30));
    }

    #[test]
    fn test_next_free_slot_starts_mid_hold() {
        let mut avail = ResourceAvailability::new();
        avail.insert(Uuid::new_v4(), window(8, 0, 10, 0)).unwrap();

        // Search start falls inside an existing hold; scan resumes at its end.
        let slot = avail
            .next_free_slot_after(at(9, 0), Duration::minutes(60), horizon())
            .unwrap();
        assert_eq!(slot, window(10, 0, 11, 0));
    }

    #[test]
    fn test_next_free_slot_respects_horizon() {
        let mut avail = ResourceAvailability::new();
        avail.insert(Uuid::new_v4(), window(8, 0, 9, 0)).unwrap();

        // Horizon of one hour from 8:00 leaves no room for 30 minutes.
        let slot = avail.next_free_slot_after(at(8, 0), Duration::minutes(30), Duration::hours(1));
        assert!(slot.is_none());
    }
}
