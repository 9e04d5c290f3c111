//! Shared fixtures for attendance integration tests.
//!
//! Provides SQLite seeding helpers and an in-memory host implementing the
//! collaborator traits.

#![allow(dead_code)]

use attendance_core::{
    AttendanceRecord, AttendanceUnitOfWork, Channel, EntityLookup, Group, Location,
    PresenceEventId, PresenceEventSource, ProcessedMarker, RawPresenceEvent, RepoError,
    RepoResult, RunConfig, Schedule,
};
use chrono::{NaiveTime, TimeZone, Utc, Weekday};
use rusqlite::{params, Connection};
use std::cell::{Cell, RefCell};
use uuid::Uuid;

/// Ids of one seeded job target.
#[derive(Debug, Clone, Copy)]
pub struct Fixture {
    pub group_id: Uuid,
    pub location_id: Uuid,
    pub campus_id: Uuid,
    pub schedule_id: Uuid,
    pub channel_id: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            group_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            campus_id: Uuid::new_v4(),
            schedule_id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
        }
    }

    pub fn config(&self, look_back_days: u32) -> RunConfig {
        RunConfig {
            group_id: self.group_id,
            location_id: self.location_id,
            schedule_id: self.schedule_id,
            channel_id: self.channel_id,
            look_back_days,
        }
    }
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap().timestamp()
}

pub fn payload(arrive: i64, depart: i64) -> String {
    format!(
        r#"{{"Space":"Main Hall","Arrive":{arrive},"Depart":{depart},"Duration":{}}}"#,
        depart - arrive
    )
}

/// Seeds a group, a campus location, a channel and a Sunday schedule whose
/// only check-in window is 09:00–09:15 UTC.
pub fn seed_sunday_fixture(conn: &Connection) -> Fixture {
    let fixture = Fixture::new();
    conn.execute(
        "INSERT INTO groups (uuid, name) VALUES (?1, 'Sunday Adults');",
        [fixture.group_id.to_string()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO locations (uuid, name, campus_uuid) VALUES (?1, 'Main Hall', ?2);",
        params![fixture.location_id.to_string(), fixture.campus_id.to_string()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO interaction_channels (uuid, name) VALUES (?1, 'Presence');",
        [fixture.channel_id.to_string()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO schedules (
            uuid, name, timezone, weekdays, start_times, duration_minutes,
            check_in_start_offset_minutes, check_in_end_offset_minutes
        ) VALUES (?1, 'Sunday 9am', 'UTC', 'sun', '09:00', 60, 0, 15);",
        [fixture.schedule_id.to_string()],
    )
    .unwrap();
    fixture
}

pub fn insert_presence(
    conn: &Connection,
    fixture: &Fixture,
    payload: &str,
    created_at: i64,
) -> Uuid {
    insert_presence_scoped(
        conn,
        fixture.channel_id,
        fixture.campus_id,
        payload,
        created_at,
    )
}

pub fn insert_presence_scoped(
    conn: &Connection,
    channel_id: Uuid,
    campus_id: Uuid,
    payload: &str,
    created_at: i64,
) -> Uuid {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO presence_events (uuid, channel_uuid, campus_uuid, person_uuid, payload, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            id.to_string(),
            channel_id.to_string(),
            campus_id.to_string(),
            Uuid::new_v4().to_string(),
            payload,
            created_at,
        ],
    )
    .unwrap();
    id
}

pub fn marker_of(conn: &Connection, event_id: Uuid) -> Option<String> {
    conn.query_row(
        "SELECT processed_marker FROM presence_events WHERE uuid = ?1;",
        [event_id.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn attendance_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM attendance;", [], |row| row.get(0))
        .unwrap()
}

/// Sunday 09:00 UTC schedule with a 15 minute check-in window.
pub fn sunday_schedule(id: Uuid) -> Schedule {
    Schedule {
        id,
        name: "Sunday 9am".to_string(),
        timezone: chrono_tz::UTC,
        weekdays: vec![Weekday::Sun],
        start_times: vec![NaiveTime::from_hms_opt(9, 0, 0).unwrap()],
        duration_minutes: 60,
        check_in_start_offset_minutes: 0,
        check_in_end_offset_minutes: Some(15),
        effective_start: None,
        effective_end: None,
        check_in_enabled: true,
    }
}

/// In-memory host store behind all collaborator traits.
pub struct FakeHost {
    pub groups: Vec<Group>,
    pub locations: Vec<Location>,
    pub schedules: Vec<Schedule>,
    pub channels: Vec<Channel>,
    pub events: RefCell<Vec<RawPresenceEvent>>,
    pub attendance: RefCell<Vec<AttendanceRecord>>,
    pub fetch_calls: Cell<usize>,
    pub fail_lookups: Cell<bool>,
}

impl FakeHost {
    pub fn seeded(fixture: &Fixture) -> Self {
        Self {
            groups: vec![Group {
                id: fixture.group_id,
                name: "Sunday Adults".to_string(),
            }],
            locations: vec![Location {
                id: fixture.location_id,
                name: "Main Hall".to_string(),
                campus_id: Some(fixture.campus_id),
            }],
            schedules: vec![sunday_schedule(fixture.schedule_id)],
            channels: vec![Channel {
                id: fixture.channel_id,
                name: "Presence".to_string(),
            }],
            events: RefCell::new(Vec::new()),
            attendance: RefCell::new(Vec::new()),
            fetch_calls: Cell::new(0),
            fail_lookups: Cell::new(false),
        }
    }

    pub fn add_event(&self, fixture: &Fixture, payload: &str, created_at: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.events.borrow_mut().push(RawPresenceEvent {
            id,
            channel_id: fixture.channel_id,
            campus_id: fixture.campus_id,
            person_id: Uuid::new_v4(),
            created_at,
            payload: payload.to_string(),
            marker: ProcessedMarker::Unprocessed,
        });
        id
    }

    pub fn marker(&self, id: Uuid) -> ProcessedMarker {
        self.events
            .borrow()
            .iter()
            .find(|event| event.id == id)
            .map(|event| event.marker)
            .unwrap()
    }

    fn lookup_guard(&self) -> RepoResult<()> {
        if self.fail_lookups.get() {
            return Err(RepoError::InvalidData("lookup backend offline".to_string()));
        }
        Ok(())
    }
}

impl EntityLookup for FakeHost {
    fn get_group(&self, id: Uuid) -> RepoResult<Option<Group>> {
        self.lookup_guard()?;
        Ok(self.groups.iter().find(|group| group.id == id).cloned())
    }

    fn get_location(&self, id: Uuid) -> RepoResult<Option<Location>> {
        self.lookup_guard()?;
        Ok(self.locations.iter().find(|location| location.id == id).cloned())
    }

    fn get_schedule(&self, id: Uuid) -> RepoResult<Option<Schedule>> {
        self.lookup_guard()?;
        Ok(self.schedules.iter().find(|schedule| schedule.id == id).cloned())
    }

    fn get_channel(&self, id: Uuid) -> RepoResult<Option<Channel>> {
        self.lookup_guard()?;
        Ok(self.channels.iter().find(|channel| channel.id == id).cloned())
    }
}

impl PresenceEventSource for FakeHost {
    fn fetch_unprocessed_events(
        &self,
        channel_id: Uuid,
        campus_id: Uuid,
        created_at_or_after: i64,
    ) -> RepoResult<Vec<RawPresenceEvent>> {
        self.fetch_calls.set(self.fetch_calls.get() + 1);
        Ok(self
            .events
            .borrow()
            .iter()
            .filter(|event| {
                event.channel_id == channel_id
                    && event.campus_id == campus_id
                    && event.created_at >= created_at_or_after
                    && !event.marker.is_consumed()
            })
            .cloned()
            .collect())
    }
}

/// Buffers writes and applies them to a `FakeHost` on commit.
pub struct FakeUnitOfWork<'h> {
    host: &'h FakeHost,
    records: Vec<AttendanceRecord>,
    marks: Vec<PresenceEventId>,
    pub fail_commit: bool,
    pub discards: usize,
}

impl<'h> FakeUnitOfWork<'h> {
    pub fn new(host: &'h FakeHost) -> Self {
        Self {
            host,
            records: Vec::new(),
            marks: Vec::new(),
            fail_commit: false,
            discards: 0,
        }
    }
}

impl AttendanceUnitOfWork for FakeUnitOfWork<'_> {
    fn create_attendance(&mut self, record: AttendanceRecord) -> RepoResult<()> {
        self.records.push(record);
        Ok(())
    }

    fn mark_processed(&mut self, event_id: PresenceEventId) -> RepoResult<()> {
        self.marks.push(event_id);
        Ok(())
    }

    fn commit(&mut self) -> RepoResult<usize> {
        if self.fail_commit {
            return Err(RepoError::InvalidData("commit rejected".to_string()));
        }
        let written = self.records.len();
        self.host.attendance.borrow_mut().append(&mut self.records);
        let mut events = self.host.events.borrow_mut();
        for id in self.marks.drain(..) {
            if let Some(event) = events.iter_mut().find(|event| event.id == id) {
                event.marker = ProcessedMarker::Consumed;
            }
        }
        Ok(written)
    }

    fn discard(&mut self) {
        self.discards += 1;
        self.records.clear();
        self.marks.clear();
    }
}
