//! Host entity lookups.
//!
//! # Responsibility
//! - Resolve group, location, schedule and channel ids to plain records.
//!
//! # Invariants
//! - A missing row is `Ok(None)`; only store failures are errors.
//! - Schedules are validated on read.

use super::{parse_uuid_column, RepoError, RepoResult};
use crate::model::entity::{Channel, Group, Location};
use crate::model::schedule::Schedule;
use crate::model::{ChannelId, GroupId, LocationId, ScheduleId};
use chrono::{NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Entity lookups the coordinator needs before scanning events.
pub trait EntityLookup {
    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>>;
    fn get_location(&self, id: LocationId) -> RepoResult<Option<Location>>;
    fn get_schedule(&self, id: ScheduleId) -> RepoResult<Option<Schedule>>;
    fn get_channel(&self, id: ChannelId) -> RepoResult<Option<Channel>>;
}

impl<T: EntityLookup + ?Sized> EntityLookup for &T {
    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>> {
        (**self).get_group(id)
    }

    fn get_location(&self, id: LocationId) -> RepoResult<Option<Location>> {
        (**self).get_location(id)
    }

    fn get_schedule(&self, id: ScheduleId) -> RepoResult<Option<Schedule>> {
        (**self).get_schedule(id)
    }

    fn get_channel(&self, id: ChannelId) -> RepoResult<Option<Channel>> {
        (**self).get_channel(id)
    }
}

/// SQLite-backed entity lookups.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EntityLookup for SqliteEntityRepository<'_> {
    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM groups WHERE uuid = ?1;",
                [id.to_string()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(name.map(|name| Group { id, name }))
    }

    fn get_location(&self, id: LocationId) -> RepoResult<Option<Location>> {
        let row = self
            .conn
            .query_row(
                "SELECT name, campus_uuid FROM locations WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;

        let Some((name, campus_text)) = row else {
            return Ok(None);
        };
        let campus_id = campus_text
            .as_deref()
            .map(|text| parse_uuid_column(text, "locations.campus_uuid"))
            .transpose()?;
        Ok(Some(Location {
            id,
            name,
            campus_id,
        }))
    }

    fn get_schedule(&self, id: ScheduleId) -> RepoResult<Option<Schedule>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                name,
                timezone,
                weekdays,
                start_times,
                duration_minutes,
                check_in_start_offset_minutes,
                check_in_end_offset_minutes,
                effective_start_date,
                effective_end_date,
                check_in_enabled
             FROM schedules
             WHERE uuid = ?1;",
        )?;
        let mut rows = stmt.query(params![id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_schedule_row(id, row)?)),
            None => Ok(None),
        }
    }

    fn get_channel(&self, id: ChannelId) -> RepoResult<Option<Channel>> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM interaction_channels WHERE uuid = ?1;",
                [id.to_string()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(name.map(|name| Channel { id, name }))
    }
}

fn parse_schedule_row(id: ScheduleId, row: &Row<'_>) -> RepoResult<Schedule> {
    let timezone_text: String = row.get("timezone")?;
    let timezone = timezone_text.parse::<Tz>().map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid timezone `{timezone_text}` in schedules.timezone"
        ))
    })?;

    let weekdays = split_list(&row.get::<_, String>("weekdays")?)
        .map(|value| {
            value.parse::<Weekday>().map_err(|_| {
                RepoError::InvalidData(format!("invalid weekday `{value}` in schedules.weekdays"))
            })
        })
        .collect::<RepoResult<Vec<_>>>()?;

    let start_times = split_list(&row.get::<_, String>("start_times")?)
        .map(parse_start_time)
        .collect::<RepoResult<Vec<_>>>()?;

    let schedule = Schedule {
        id,
        name: row.get("name")?,
        timezone,
        weekdays,
        start_times,
        duration_minutes: non_negative(row.get("duration_minutes")?, "duration_minutes")?,
        check_in_start_offset_minutes: non_negative(
            row.get("check_in_start_offset_minutes")?,
            "check_in_start_offset_minutes",
        )?,
        check_in_end_offset_minutes: row
            .get::<_, Option<i64>>("check_in_end_offset_minutes")?
            .map(|value| non_negative(value, "check_in_end_offset_minutes"))
            .transpose()?,
        effective_start: parse_optional_date(
            row.get("effective_start_date")?,
            "effective_start_date",
        )?,
        effective_end: parse_optional_date(row.get("effective_end_date")?, "effective_end_date")?,
        check_in_enabled: match row.get::<_, i64>("check_in_enabled")? {
            0 => false,
            1 => true,
            other => {
                return Err(RepoError::InvalidData(format!(
                    "invalid check_in_enabled value `{other}` in schedules.check_in_enabled"
                )));
            }
        },
    };

    schedule
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("schedule {id}: {err}")))?;
    Ok(schedule)
}

fn split_list(value: &str) -> impl Iterator<Item = &str> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

fn parse_start_time(value: &str) -> RepoResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| {
            RepoError::InvalidData(format!("invalid start time `{value}` in schedules.start_times"))
        })
}

fn parse_optional_date(value: Option<String>, column: &str) -> RepoResult<Option<NaiveDate>> {
    value
        .map(|text| {
            text.parse::<NaiveDate>().map_err(|_| {
                RepoError::InvalidData(format!("invalid date `{text}` in schedules.{column}"))
            })
        })
        .transpose()
}

fn non_negative(value: i64, column: &str) -> RepoResult<u32> {
    u32::try_from(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid minutes `{value}` in schedules.{column}"))
    })
}
