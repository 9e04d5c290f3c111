//! Recurring schedule definition and derived check-in windows.
//!
//! # Responsibility
//! - Describe a weekly recurring meeting in its own reference timezone.
//! - Compute the concrete UTC check-in windows for one local calendar date.
//!
//! # Invariants
//! - `check_in_windows` is a pure function of `(schedule, date)`.
//! - Returned windows are ordered by start and never empty (`start < end`).
//! - Local times inside a DST gap produce no window; ambiguous local times
//!   resolve to the earlier instant.

use super::{EpochSeconds, ScheduleId};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const SECONDS_PER_MINUTE: i64 = 60;

/// One concrete check-in interval `[start, end)` in UTC epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub start: EpochSeconds,
    pub end: EpochSeconds,
}

impl ScheduleWindow {
    pub fn new(start: EpochSeconds, end: EpochSeconds) -> Self {
        debug_assert!(start < end, "check-in window start must be before end");
        Self { start, end }
    }

    pub fn duration_seconds(&self) -> i64 {
        self.end - self.start
    }
}

/// Black-box source of check-in windows for a calendar date.
///
/// The window resolver only sees this trait, so any recurrence engine can
/// stand behind it.
pub trait CheckInTimes {
    /// Timezone whose calendar dates key `check_in_windows`.
    fn reference_timezone(&self) -> Tz;

    /// Check-in windows for one local calendar date, ordered by start.
    fn check_in_windows(&self, date: NaiveDate) -> Vec<ScheduleWindow>;
}

/// Weekly recurring schedule with check-in offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: String,
    pub timezone: Tz,
    /// Weekdays on which the schedule occurs.
    pub weekdays: Vec<Weekday>,
    /// Local occurrence start times on each recurring day.
    pub start_times: Vec<NaiveTime>,
    pub duration_minutes: u32,
    /// Minutes before an occurrence starts that check-in opens.
    pub check_in_start_offset_minutes: u32,
    /// Minutes after an occurrence starts that check-in closes.
    /// `None` keeps check-in open until the occurrence ends.
    pub check_in_end_offset_minutes: Option<u32>,
    pub effective_start: Option<NaiveDate>,
    pub effective_end: Option<NaiveDate>,
    pub check_in_enabled: bool,
}

/// Structural problems in a schedule definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleValidationError {
    EffectiveRangeInverted {
        start: NaiveDate,
        end: NaiveDate,
    },
    ZeroDuration,
}

impl Display for ScheduleValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EffectiveRangeInverted { start, end } => write!(
                f,
                "schedule effective end {end} is earlier than effective start {start}"
            ),
            Self::ZeroDuration => write!(f, "schedule duration must be positive"),
        }
    }
}

impl Error for ScheduleValidationError {}

impl Schedule {
    pub fn validate(&self) -> Result<(), ScheduleValidationError> {
        if let (Some(start), Some(end)) = (self.effective_start, self.effective_end) {
            if end < start {
                return Err(ScheduleValidationError::EffectiveRangeInverted { start, end });
            }
        }
        if self.duration_minutes == 0 {
            return Err(ScheduleValidationError::ZeroDuration);
        }
        Ok(())
    }

    /// Whether the schedule has an occurrence day on `date`.
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        if self.effective_start.is_some_and(|start| date < start) {
            return false;
        }
        if self.effective_end.is_some_and(|end| date > end) {
            return false;
        }
        self.weekdays.contains(&date.weekday())
    }

    fn window_at(&self, local: NaiveDateTime) -> Option<ScheduleWindow> {
        let occurrence = self.timezone.from_local_datetime(&local).earliest()?;
        let occurrence_start = occurrence.timestamp();
        let open = occurrence_start
            - i64::from(self.check_in_start_offset_minutes) * SECONDS_PER_MINUTE;
        let close_after = self
            .check_in_end_offset_minutes
            .unwrap_or(self.duration_minutes);
        let close = occurrence_start + i64::from(close_after) * SECONDS_PER_MINUTE;
        (open < close).then(|| ScheduleWindow::new(open, close))
    }
}

impl CheckInTimes for Schedule {
    fn reference_timezone(&self) -> Tz {
        self.timezone
    }

    fn check_in_windows(&self, date: NaiveDate) -> Vec<ScheduleWindow> {
        if !self.check_in_enabled || !self.occurs_on(date) {
            return Vec::new();
        }

        let mut start_times = self.start_times.clone();
        start_times.sort_unstable();
        start_times.dedup();

        start_times
            .into_iter()
            .filter_map(|time| self.window_at(date.and_time(time)))
            .collect()
    }
}
