//! Per-run memoized check-in window resolution.
//!
//! # Responsibility
//! - Map an arrival instant to its calendar date in the schedule timezone.
//! - Ask the schedule for that date's windows at most once per run.
//!
//! # Invariants
//! - A resolver lives for exactly one run; nothing is shared across runs.
//! - Cached and uncached lookups return identical windows.

use crate::model::schedule::{CheckInTimes, ScheduleWindow};
use crate::model::EpochSeconds;
use chrono::{DateTime, NaiveDate};
use std::collections::HashMap;

pub struct ScheduleWindowResolver<'s, S: CheckInTimes + ?Sized> {
    schedule: &'s S,
    cache: HashMap<NaiveDate, Vec<ScheduleWindow>>,
}

impl<'s, S: CheckInTimes + ?Sized> ScheduleWindowResolver<'s, S> {
    pub fn new(schedule: &'s S) -> Self {
        Self {
            schedule,
            cache: HashMap::new(),
        }
    }

    /// Calendar date of `instant` in the schedule's reference timezone.
    ///
    /// Returns `None` when the instant is outside the representable range.
    pub fn local_date(&self, instant: EpochSeconds) -> Option<NaiveDate> {
        let utc = DateTime::from_timestamp(instant, 0)?;
        Some(
            utc.with_timezone(&self.schedule.reference_timezone())
                .date_naive(),
        )
    }

    /// Ordered check-in windows for `date`.
    pub fn windows_for(&mut self, date: NaiveDate) -> &[ScheduleWindow] {
        let schedule = self.schedule;
        self.cache
            .entry(date)
            .or_insert_with(|| schedule.check_in_windows(date))
    }

    /// Windows for the local date containing `arrive`.
    pub fn windows_for_arrival(&mut self, arrive: EpochSeconds) -> Option<&[ScheduleWindow]> {
        let date = self.local_date(arrive)?;
        Some(self.windows_for(date))
    }

    /// Number of distinct dates resolved so far.
    pub fn resolved_dates(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Tz;
    use std::cell::Cell;

    /// Window source that records how often it is asked.
    struct CountingSchedule {
        timezone: Tz,
        calls: Cell<usize>,
    }

    impl CheckInTimes for CountingSchedule {
        fn reference_timezone(&self) -> Tz {
            self.timezone
        }

        fn check_in_windows(&self, date: NaiveDate) -> Vec<ScheduleWindow> {
            self.calls.set(self.calls.get() + 1);
            let start = self
                .timezone
                .from_local_datetime(&date.and_hms_opt(9, 0, 0).unwrap())
                .earliest()
                .unwrap()
                .timestamp();
            vec![ScheduleWindow::new(start, start + 900)]
        }
    }

    fn counting(timezone: Tz) -> CountingSchedule {
        CountingSchedule {
            timezone,
            calls: Cell::new(0),
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> EpochSeconds {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap().timestamp()
    }

    #[test]
    fn same_date_is_computed_once() {
        let schedule = counting(chrono_tz::UTC);
        let mut resolver = ScheduleWindowResolver::new(&schedule);

        let first = resolver.windows_for_arrival(at(2024, 1, 7, 8)).unwrap().to_vec();
        let second = resolver.windows_for_arrival(at(2024, 1, 7, 20)).unwrap().to_vec();
        resolver.windows_for_arrival(at(2024, 1, 8, 8)).unwrap();

        assert_eq!(first, second);
        assert_eq!(schedule.calls.get(), 2);
        assert_eq!(resolver.resolved_dates(), 2);
    }

    #[test]
    fn cached_result_matches_direct_computation() {
        let schedule = counting(chrono_tz::UTC);
        let date = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        let direct = schedule.check_in_windows(date);

        let mut resolver = ScheduleWindowResolver::new(&schedule);
        assert_eq!(resolver.windows_for(date), direct.as_slice());
        assert_eq!(resolver.windows_for(date), direct.as_slice());
    }

    #[test]
    fn date_key_uses_schedule_timezone() {
        let schedule = counting(chrono_tz::America::Chicago);
        let resolver = ScheduleWindowResolver::new(&schedule);
        // 03:00 UTC on Jan 8 is still Jan 7 in Chicago.
        assert_eq!(
            resolver.local_date(at(2024, 1, 8, 3)),
            NaiveDate::from_ymd_opt(2024, 1, 7)
        );
    }

    #[test]
    fn out_of_range_instant_has_no_date() {
        let schedule = counting(chrono_tz::UTC);
        let mut resolver = ScheduleWindowResolver::new(&schedule);
        assert!(resolver.windows_for_arrival(i64::MAX).is_none());
        assert_eq!(schedule.calls.get(), 0);
    }

    #[test]
    fn fresh_resolver_starts_with_empty_cache() {
        let schedule = counting(chrono_tz::UTC);
        {
            let mut resolver = ScheduleWindowResolver::new(&schedule);
            resolver.windows_for_arrival(at(2024, 1, 7, 9)).unwrap();
        }
        let mut resolver = ScheduleWindowResolver::new(&schedule);
        assert_eq!(resolver.resolved_dates(), 0);
        resolver.windows_for_arrival(at(2024, 1, 7, 9)).unwrap();
        assert_eq!(schedule.calls.get(), 2);
    }
}
