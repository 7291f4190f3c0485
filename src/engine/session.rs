//! Trading-session gate for new signals.
//!
//! A signal may only open on a weekday, inside `[start_hour, end_hour)` local
//! time of the session timezone.  DST is handled by `chrono-tz`.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub tz:         Tz,
    pub start_hour: u32,
    /// Exclusive.
    pub end_hour:   u32,
}

impl SessionWindow {
    pub fn new(tz: Tz, start_hour: u32, end_hour: u32) -> Self {
        Self { tz, start_hour, end_hour }
    }

    /// New York 08:00–11:00.
    pub fn new_york_morning() -> Self {
        Self::new(chrono_tz::America::New_York, 8, 11)
    }

    /// `true` if `at` falls on a local weekday inside the hour window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.tz);
        let weekend = matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
        !weekend && (self.start_hour..self.end_hour).contains(&local.hour())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ny(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
        chrono_tz::America::New_York
            .with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_session_boundaries() {
        let w = SessionWindow::new_york_morning();
        // 2026-03-02 is a Monday
        assert!(!w.contains(ny(2026, 3, 2, 7, 59, 59)));
        assert!(w.contains(ny(2026, 3, 2, 8, 0, 0)));
        assert!(w.contains(ny(2026, 3, 2, 10, 59, 59)));
        assert!(!w.contains(ny(2026, 3, 2, 11, 0, 0)));
    }

    #[test]
    fn test_weekend_is_closed() {
        let w = SessionWindow::new_york_morning();
        // 2026-03-07 is a Saturday, 2026-03-08 a Sunday
        assert!(!w.contains(ny(2026, 3, 7, 9, 0, 0)));
        assert!(!w.contains(ny(2026, 3, 8, 9, 0, 0)));
    }

    #[test]
    fn test_dst_shift_follows_local_time() {
        let w = SessionWindow::new_york_morning();
        // EST (UTC-5): 13:30 UTC is 08:30 local
        assert!(w.contains(Utc.with_ymd_and_hms(2026, 1, 12, 13, 30, 0).unwrap()));
        // EDT (UTC-4): 12:30 UTC is 08:30 local, 15:30 UTC is 11:30 local
        assert!(w.contains(Utc.with_ymd_and_hms(2026, 6, 15, 12, 30, 0).unwrap()));
        assert!(!w.contains(Utc.with_ymd_and_hms(2026, 6, 15, 15, 30, 0).unwrap()));
    }
}
