//! Availability view projection
//!
//! Read-only, per-resource, per-day projection of the ledger used to render
//! a calendar grid. Views are rebuilt from a ledger snapshot after every
//! mutation and never patched in place; the `version` field lets a consumer
//! detect that a held view has gone stale.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{CoreError, CoreResult},
    models::window::TimeWindow,
};

use super::ReservationLedger;

/// Inclusive date range for a view query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> CoreResult<Self> {
        if from > to {
            return Err(CoreError::InvalidWindow(format!(
                "date range {} to {} is inverted",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    pub fn single_day(date: NaiveDate) -> Self {
        Self { from: date, to: date }
    }

    fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d <= to)
    }
}

/// Occupancy state of one segment of a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentState {
    Free,
    Occupied { reservation_id: Uuid, user_id: i32 },
}

/// A contiguous stretch of a day with uniform occupancy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub window: TimeWindow,
    #[serde(flatten)]
    pub state: SegmentState,
}

/// One calendar day of a resource's availability
#[derive(Debug, Clone, Serialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    /// Alternating free/occupied segments covering the whole day
    pub segments: Vec<Segment>,
}

/// Snapshot of a resource's availability over a date range
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityView {
    pub resource_id: String,
    /// Resource version at snapshot time; compare against the ledger's
    /// current version to detect staleness
    pub version: u64,
    pub generated_at: DateTime<Utc>,
    pub days: Vec<DayAvailability>,
}

impl AvailabilityView {
    /// Project a ledger snapshot for one resource over a date range.
    ///
    /// Reservations spanning midnight are clipped to day boundaries, so a
    /// day's segments always tile exactly `[00:00, 24:00)`.
    pub fn build(
        ledger: &ReservationLedger,
        resource_id: &str,
        range: DateRange,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let availability = ledger.availability(resource_id)?;

        let mut days = Vec::new();
        for date in range.days() {
            let day_start = date.and_time(NaiveTime::MIN).and_utc();
            let day_end = day_start + chrono::Duration::days(1);
            let day_window = TimeWindow::new(day_start, day_end)?;

            let mut segments = Vec::new();
            let mut cursor = day_start;
            for hold in availability.holds() {
                let Some(clipped) = hold.window.intersect(&day_window) else {
                    continue;
                };
                if clipped.start() > cursor {
                    segments.push(Segment {
                        window: TimeWindow::new(cursor, clipped.start())?,
                        state: SegmentState::Free,
                    });
                }
                // A hold without a backing record means the ledger is
                // corrupt; surface it rather than fabricating an owner.
                let user_id = ledger
                    .reservation(hold.reservation_id)
                    .map(|r| r.user_id)
                    .ok_or(CoreError::NotFound(hold.reservation_id))?;
                segments.push(Segment {
                    window: clipped,
                    state: SegmentState::Occupied {
                        reservation_id: hold.reservation_id,
                        user_id,
                    },
                });
                cursor = clipped.end();
            }
            if cursor < day_end {
                segments.push(Segment {
                    window: TimeWindow::new(cursor, day_end)?,
                    state: SegmentState::Free,
                });
            }
            days.push(DayAvailability { date, segments });
        }

        Ok(Self {
            resource_id: resource_id.to_string(),
            version: ledger.version(resource_id),
            generated_at: now,
            days,
        })
    }
}
