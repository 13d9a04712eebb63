//! Time window value type
//!
//! A reservation holds a resource for a half-open interval `[start, end)`.
//! Touching windows (one ending exactly when the other starts) do not
//! overlap, so back-to-back reservations are always compatible.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Half-open time interval `[start, end)`.
///
/// Invariant: `start < end`. Enforced at construction and deserialization;
/// a constructed value is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowSpec")]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Raw window shape used for deserialization before validation
#[derive(Debug, Deserialize)]
struct WindowSpec {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<WindowSpec> for TimeWindow {
    type Error = CoreError;

    fn try_from(spec: WindowSpec) -> Result<Self, Self::Error> {
        TimeWindow::new(spec.start, spec.end)
    }
}

impl TimeWindow {
    /// Create a window, rejecting empty and inverted intervals
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<Self> {
        if start >= end {
            return Err(CoreError::InvalidWindow(format!(
                "start {} must be strictly before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Standard half-open overlap test; touching endpoints do not overlap
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Intersection with another window, if non-empty
    pub fn intersect(&self, other: &TimeWindow) -> Option<TimeWindow> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(TimeWindow { start, end })
        } else {
            None
        }
    }

    /// Whether the window has fully elapsed at `now`
    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.end <= now
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, hour, min, 0).unwrap()
    }

    #[test]
    fn test_rejects_inverted_window() {
        assert!(TimeWindow::new(at(11, 0), at(10, 0)).is_err());
    }

    #[test]
    fn test_rejects_zero_length_window() {
        assert!(TimeWindow::new(at(10, 0), at(10, 0)).is_err());
    }

    #[test]
    fn test_overlap_symmetry() {
        let a = TimeWindow::new(at(9, 0), at(10, 30)).unwrap();
        let b = TimeWindow::new(at(10, 0), at(11, 0)).unwrap();
        let c = TimeWindow::new(at(11, 0), at(12, 0)).unwrap();
        assert_eq!(a.overlaps(&b), b.overlaps(&a));
        assert_eq!(a.overlaps(&c), c.overlaps(&a));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_touching_windows_do_not_overlap() {
        let morning = TimeWindow::new(at(10, 0), at(11, 0)).unwrap();
        let noon = TimeWindow::new(at(11, 0), at(12, 0)).unwrap();
        assert!(!morning.overlaps(&noon));
        assert!(!noon.overlaps(&morning));
    }

    #[test]
    fn test_contained_window_overlaps() {
        let outer = TimeWindow::new(at(9, 0), at(12, 0)).unwrap();
        let inner = TimeWindow::new(at(10, 0), at(11, 0)).unwrap();
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn test_duration_minutes() {
        let w = TimeWindow::new(at(9, 0), at(10, 30)).unwrap();
        assert_eq!(w.duration_minutes(), 90);
    }

    #[test]
    fn test_intersect() {
        let a = TimeWindow::new(at(9, 0), at(11, 0)).unwrap();
        let b = TimeWindow::new(at(10, 0), at(12, 0)).unwrap();
        let i = a.intersect(&b).unwrap();
        assert_eq!(i.start(), at(10, 0));
        assert_eq!(i.end(), at(11, 0));

        let c = TimeWindow::new(at(11, 0), at(12, 0)).unwrap();
        assert!(a.intersect(&c).is_none());
    }

    #[test]
    fn test_deserialize_enforces_invariant() {
        let bad = r#"{"start":"2025-06-02T11:00:00Z","end":"2025-06-02T10:00:00Z"}"#;
        assert!(serde_json::from_str::<TimeWindow>(bad).is_err());

        let good = r#"{"start":"2025-06-02T09:00:00Z","end":"2025-06-02T10:00:00Z"}"#;
        let w: TimeWindow = serde_json::from_str(good).unwrap();
        assert_eq!(w.duration_minutes(), 60);
    }
}
