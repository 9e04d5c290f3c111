//! Attendance population from presence-sensor events.
//!
//! Matches unprocessed presence events against a recurring schedule's
//! check-in windows and records one attendance per qualifying event,
//! marking each consumed event so later runs never duplicate it.

pub mod config;
pub mod db;
pub mod logging;
pub mod matching;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, RunConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use matching::{first_overlapping, overlaps, ScheduleWindowResolver};
pub use model::attendance::{AttendanceRecord, AttendanceTarget};
pub use model::entity::{Channel, EntityKind, Group, Location};
pub use model::presence::{
    PresenceDataError, PresenceEvent, PresenceEventId, ProcessedMarker, RawPresenceEvent,
    CONSUMED_MARKER,
};
pub use model::schedule::{CheckInTimes, Schedule, ScheduleWindow};
pub use repo::attendance_repo::{
    list_attendance_for_group, AttendanceUnitOfWork, SqliteAttendanceUnitOfWork,
};
pub use repo::entity_repo::{EntityLookup, SqliteEntityRepository};
pub use repo::presence_repo::{PresenceEventSource, SqlitePresenceRepository};
pub use repo::{RepoError, RepoResult};
pub use service::populate_service::{
    populate_attendance, AttendancePopulator, PopulateError, RunResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
