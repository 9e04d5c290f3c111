//! Attendance population batch.
//!
//! # Responsibility
//! - Resolve the configured entities, scan unprocessed presence events and
//!   turn every event overlapping a check-in window into attendance.
//! - Commit attendance and consumed marks as one unit of work per run.
//!
//! # Invariants
//! - Configuration problems fail before any event fetch or write.
//! - Schedule windows are computed once per distinct local date per run.
//! - Malformed payloads are skipped, left unmarked and not counted.
//! - At most one attendance record per event; the first overlapping window
//!   wins.
//! - Any collaborator failure discards all buffered writes.
//!
//! # Preconditions
//! - The host never runs two batches for the same configuration at once.

use crate::config::{ConfigError, RunConfig};
use crate::matching::{first_overlapping, ScheduleWindowResolver};
use crate::model::attendance::{AttendanceRecord, AttendanceTarget};
use crate::model::entity::{EntityKind, Location};
use crate::model::presence::RawPresenceEvent;
use crate::model::schedule::{CheckInTimes, Schedule};
use crate::repo::attendance_repo::{AttendanceUnitOfWork, SqliteAttendanceUnitOfWork};
use crate::repo::entity_repo::{EntityLookup, SqliteEntityRepository};
use crate::repo::presence_repo::{PresenceEventSource, SqlitePresenceRepository};
use crate::repo::RepoError;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Fatal failure of one run. Nothing is committed when this is returned.
#[derive(Debug)]
pub enum PopulateError {
    Configuration(ConfigError),
    Collaborator(RepoError),
}

impl Display for PopulateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "configuration error: {err}"),
            Self::Collaborator(err) => write!(f, "store error: {err}"),
        }
    }
}

impl Error for PopulateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(err) => Some(err),
            Self::Collaborator(err) => Some(err),
        }
    }
}

impl From<ConfigError> for PopulateError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value)
    }
}

impl From<RepoError> for PopulateError {
    fn from(value: RepoError) -> Self {
        Self::Collaborator(value)
    }
}

/// Outcome of one successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Attendance records created (and events marked consumed).
    pub created: usize,
    /// Unprocessed events fetched inside the look-back window.
    pub scanned: usize,
    /// Events skipped because their payload could not be decoded.
    pub malformed: usize,
    /// Decoded events that overlapped no check-in window.
    pub unmatched: usize,
    pub message: String,
}

impl RunResult {
    fn new(created: usize, scanned: usize, malformed: usize, unmatched: usize) -> Self {
        Self {
            created,
            scanned,
            malformed,
            unmatched,
            message: format!("Added {created} attendance records"),
        }
    }
}

/// Entities resolved from a `RunConfig`.
struct RunContext {
    target: AttendanceTarget,
    schedule: Schedule,
    location: Location,
}

/// Batch coordinator over the three collaborator contracts.
pub struct AttendancePopulator<L, S, U>
where
    L: EntityLookup,
    S: PresenceEventSource,
    U: AttendanceUnitOfWork,
{
    lookup: L,
    source: S,
    unit_of_work: U,
}

impl<L, S, U> AttendancePopulator<L, S, U>
where
    L: EntityLookup,
    S: PresenceEventSource,
    U: AttendanceUnitOfWork,
{
    pub fn new(lookup: L, source: S, unit_of_work: U) -> Self {
        Self {
            lookup,
            source,
            unit_of_work,
        }
    }

    pub fn into_parts(self) -> (L, S, U) {
        (self.lookup, self.source, self.unit_of_work)
    }

    /// Runs one batch as of `now`.
    ///
    /// # Errors
    /// - `Configuration` when an entity is missing or the location has no
    ///   campus.
    /// - `Collaborator` when a lookup, fetch or commit fails.
    pub fn run(&mut self, config: &RunConfig, now: DateTime<Utc>) -> Result<RunResult, PopulateError> {
        let started_at = Instant::now();
        info!(
            "event=attendance_run module=service status=start schedule={} group={} look_back_days={}",
            config.schedule_id, config.group_id, config.look_back_days
        );

        match self.run_batch(config, now) {
            Ok(result) => {
                info!(
                    "event=attendance_run module=service status=ok created={} scanned={} malformed={} unmatched={} duration_ms={}",
                    result.created,
                    result.scanned,
                    result.malformed,
                    result.unmatched,
                    started_at.elapsed().as_millis()
                );
                Ok(result)
            }
            Err(err) => {
                self.unit_of_work.discard();
                error!(
                    "event=attendance_run module=service status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn resolve_context(&self, config: &RunConfig) -> Result<RunContext, PopulateError> {
        let not_found = |kind, id| ConfigError::EntityNotFound { kind, id };

        let group = self
            .lookup
            .get_group(config.group_id)?
            .ok_or_else(|| not_found(EntityKind::Group, config.group_id))?;
        let location = self
            .lookup
            .get_location(config.location_id)?
            .ok_or_else(|| not_found(EntityKind::Location, config.location_id))?;
        let schedule = self
            .lookup
            .get_schedule(config.schedule_id)?
            .ok_or_else(|| not_found(EntityKind::Schedule, config.schedule_id))?;
        let channel = self
            .lookup
            .get_channel(config.channel_id)?
            .ok_or_else(|| not_found(EntityKind::Channel, config.channel_id))?;

        let campus_id = location
            .campus_id
            .ok_or_else(|| ConfigError::LocationWithoutCampus {
                location_id: location.id,
                name: location.name.clone(),
            })?;

        debug!(
            "event=attendance_context module=service group={} location={} schedule={} channel={} campus={}",
            group.name, location.name, schedule.name, channel.name, campus_id
        );

        Ok(RunContext {
            target: AttendanceTarget {
                group_id: group.id,
                location_id: location.id,
                schedule_id: schedule.id,
                campus_id,
            },
            schedule,
            location,
        })
    }

    fn run_batch(&mut self, config: &RunConfig, now: DateTime<Utc>) -> Result<RunResult, PopulateError> {
        let cutoff = config.created_cutoff(now)?.timestamp();
        let context = self.resolve_context(config)?;

        let events = self.source.fetch_unprocessed_events(
            config.channel_id,
            context.target.campus_id,
            cutoff,
        )?;
        debug!(
            "event=presence_fetch module=service location={} cutoff={} events={}",
            context.location.name,
            cutoff,
            events.len()
        );

        let tally = match_events(
            &context.schedule,
            &context.target,
            &events,
            &mut self.unit_of_work,
        )?;

        let committed = self.unit_of_work.commit()?;
        debug_assert_eq!(committed, tally.created);

        Ok(RunResult::new(
            tally.created,
            events.len(),
            tally.malformed,
            tally.unmatched,
        ))
    }
}

/// Per-run counters from `match_events`.
#[derive(Debug, Default, PartialEq, Eq)]
struct MatchTally {
    created: usize,
    malformed: usize,
    unmatched: usize,
    resolved_dates: usize,
}

/// Buffers one attendance record and one consumed mark per matching event.
///
/// Windows come from a resolver owned by this call, so each local date is
/// computed at most once per run.
fn match_events<T, U>(
    schedule: &T,
    target: &AttendanceTarget,
    events: &[RawPresenceEvent],
    unit_of_work: &mut U,
) -> Result<MatchTally, RepoError>
where
    T: CheckInTimes + ?Sized,
    U: AttendanceUnitOfWork,
{
    let mut resolver = ScheduleWindowResolver::new(schedule);
    let mut tally = MatchTally::default();

    for raw in events {
        let event = match raw.decode() {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    "event=presence_skip module=service reason=malformed_payload event_id={} error={}",
                    err.event_id(),
                    err
                );
                tally.malformed += 1;
                continue;
            }
        };

        let Some(windows) = resolver.windows_for_arrival(event.arrive) else {
            warn!(
                "event=presence_skip module=service reason=arrival_out_of_range event_id={}",
                event.id
            );
            tally.malformed += 1;
            continue;
        };

        let Some(window) = first_overlapping(&event, windows) else {
            debug!(
                "event=presence_unmatched module=service event_id={} arrive={} depart={}",
                event.id, event.arrive, event.depart
            );
            tally.unmatched += 1;
            continue;
        };
        debug!(
            "event=presence_matched module=service event_id={} window_start={} window_end={}",
            event.id, window.start, window.end
        );

        unit_of_work.create_attendance(AttendanceRecord::attended(&event, target))?;
        unit_of_work.mark_processed(event.id)?;
        tally.created += 1;
    }

    tally.resolved_dates = resolver.resolved_dates();
    debug!(
        "event=schedule_windows module=service resolved_dates={}",
        tally.resolved_dates
    );
    Ok(tally)
}

/// Runs one batch against a SQLite attendance store.
pub fn populate_attendance(
    conn: &Connection,
    config: &RunConfig,
    now: DateTime<Utc>,
) -> Result<RunResult, PopulateError> {
    let mut populator = AttendancePopulator::new(
        SqliteEntityRepository::new(conn),
        SqlitePresenceRepository::new(conn),
        SqliteAttendanceUnitOfWork::new(conn),
    );
    populator.run(config, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::presence::ProcessedMarker;
    use crate::model::schedule::ScheduleWindow;
    use crate::model::EpochSeconds;
    use crate::repo::RepoResult;
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::Tz;
    use std::cell::Cell;
    use uuid::Uuid;

    /// 09:00-09:15 UTC every day, counting how often windows are computed.
    struct CountingSchedule {
        calls: Cell<usize>,
    }

    impl CheckInTimes for CountingSchedule {
        fn reference_timezone(&self) -> Tz {
            chrono_tz::UTC
        }

        fn check_in_windows(&self, date: NaiveDate) -> Vec<ScheduleWindow> {
            self.calls.set(self.calls.get() + 1);
            let start = date.and_hms_opt(9, 0, 0).unwrap().and_utc().timestamp();
            vec![ScheduleWindow::new(start, start + 900)]
        }
    }

    #[derive(Default)]
    struct BufferedWrites {
        records: Vec<AttendanceRecord>,
        marks: Vec<Uuid>,
    }

    impl AttendanceUnitOfWork for BufferedWrites {
        fn create_attendance(&mut self, record: AttendanceRecord) -> RepoResult<()> {
            self.records.push(record);
            Ok(())
        }

        fn mark_processed(&mut self, event_id: Uuid) -> RepoResult<()> {
            self.marks.push(event_id);
            Ok(())
        }

        fn commit(&mut self) -> RepoResult<usize> {
            Ok(self.records.len())
        }

        fn discard(&mut self) {
            self.records.clear();
            self.marks.clear();
        }
    }

    fn at(d: u32, h: u32, min: u32) -> EpochSeconds {
        Utc.with_ymd_and_hms(2024, 1, d, h, min, 0).unwrap().timestamp()
    }

    fn event(arrive: EpochSeconds, depart: EpochSeconds) -> RawPresenceEvent {
        RawPresenceEvent {
            id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
            campus_id: Uuid::new_v4(),
            person_id: Uuid::new_v4(),
            created_at: depart,
            payload: format!(r#"{{"Arrive":{arrive},"Depart":{depart}}}"#),
            marker: ProcessedMarker::Unprocessed,
        }
    }

    fn target() -> AttendanceTarget {
        AttendanceTarget {
            group_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            schedule_id: Uuid::new_v4(),
            campus_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn windows_are_computed_once_per_date_across_a_batch() {
        let schedule = CountingSchedule {
            calls: Cell::new(0),
        };
        let events = vec![
            event(at(7, 9, 1), at(7, 9, 5)),
            event(at(7, 9, 10), at(7, 9, 40)),
            event(at(7, 18, 0), at(7, 19, 0)),
            event(at(8, 9, 2), at(8, 9, 3)),
            event(at(7, 9, 14), at(7, 9, 20)),
        ];
        let mut writes = BufferedWrites::default();

        let tally = match_events(&schedule, &target(), &events, &mut writes).unwrap();

        assert_eq!(schedule.calls.get(), 2);
        assert_eq!(
            tally,
            MatchTally {
                created: 4,
                malformed: 0,
                unmatched: 1,
                resolved_dates: 2,
            }
        );
        assert_eq!(writes.marks.len(), 4);
        assert!(!writes.marks.contains(&events[2].id));
    }

    #[test]
    fn malformed_events_never_reach_the_schedule() {
        let schedule = CountingSchedule {
            calls: Cell::new(0),
        };
        let mut broken = event(at(7, 9, 1), at(7, 9, 5));
        broken.payload = "null".to_string();
        let mut writes = BufferedWrites::default();

        let tally = match_events(&schedule, &target(), &[broken], &mut writes).unwrap();

        assert_eq!(tally.malformed, 1);
        assert_eq!(schedule.calls.get(), 0);
        assert!(writes.records.is_empty());
    }
}
