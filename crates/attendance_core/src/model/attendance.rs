//! Attendance record created from a matched presence event.

use super::presence::{PresenceEvent, PresenceEventId};
use super::{CampusId, EpochSeconds, GroupId, LocationId, PersonId, ScheduleId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AttendanceId = Uuid;

/// Group/location/schedule/campus a run writes attendance against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceTarget {
    pub group_id: GroupId,
    pub location_id: LocationId,
    pub schedule_id: ScheduleId,
    pub campus_id: CampusId,
}

/// One attendance row. Created once per qualifying event and never updated
/// by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub person_id: PersonId,
    pub schedule_id: ScheduleId,
    pub campus_id: CampusId,
    pub location_id: LocationId,
    pub group_id: GroupId,
    /// Arrival time of the source event.
    pub start_at: EpochSeconds,
    pub did_attend: bool,
    pub source_event_id: PresenceEventId,
}

impl AttendanceRecord {
    /// Builds the attended record for `event` under `target`.
    pub fn attended(event: &PresenceEvent, target: &AttendanceTarget) -> Self {
        Self {
            id: Uuid::new_v4(),
            person_id: event.person_id,
            schedule_id: target.schedule_id,
            campus_id: target.campus_id,
            location_id: target.location_id,
            group_id: target.group_id,
            start_at: event.arrive,
            did_attend: true,
            source_event_id: event.id,
        }
    }
}
