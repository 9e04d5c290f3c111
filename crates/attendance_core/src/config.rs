//! Run configuration parsing and validation.
//!
//! # Responsibility
//! - Turn host job data (string key/value pairs) into a typed `RunConfig`.
//! - Accept the same keys from a JSON job definition document.
//!
//! # Invariants
//! - All five fields are required; blank values count as missing.
//! - `DaysBack` is a non-negative whole number of days.
//! - Validation happens before any lookup, fetch or write.

use crate::model::entity::EntityKind;
use crate::model::{ChannelId, EntityId, GroupId, LocationId, ScheduleId};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::BuildHasher;
use uuid::Uuid;

pub const GROUP_KEY: &str = "Group";
pub const LOCATION_KEY: &str = "Location";
pub const SCHEDULE_KEY: &str = "Schedule";
pub const CHANNEL_KEY: &str = "InteractionChannel";
pub const DAYS_BACK_KEY: &str = "DaysBack";

/// Validated settings for one attendance population job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub group_id: GroupId,
    pub location_id: LocationId,
    pub schedule_id: ScheduleId,
    pub channel_id: ChannelId,
    /// Size of the creation-time window to scan.
    pub look_back_days: u32,
}

/// Fatal configuration problem. No fetch or write happens after one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required keys absent or blank, in declaration order.
    MissingFields(Vec<&'static str>),
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
    /// Job definition document could not be read as a key/value object.
    MalformedDocument(String),
    EntityNotFound {
        kind: EntityKind,
        id: EntityId,
    },
    LocationWithoutCampus {
        location_id: LocationId,
        name: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFields(fields) => write!(
                f,
                "invalid settings: missing {}; group, location, schedule, interaction channel and days back are required",
                fields.join(", ")
            ),
            Self::InvalidField {
                field,
                value,
                reason,
            } => write!(f, "invalid setting `{field}` = `{value}`: {reason}"),
            Self::MalformedDocument(message) => {
                write!(f, "job definition is malformed: {message}")
            }
            Self::EntityNotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::LocationWithoutCampus { location_id, name } => {
                write!(f, "no campus could be found for location `{name}` ({location_id})")
            }
        }
    }
}

impl Error for ConfigError {}

impl RunConfig {
    /// Parses host job data keyed by `Group`, `Location`, `Schedule`,
    /// `InteractionChannel` and `DaysBack`.
    ///
    /// # Errors
    /// - `MissingFields` lists every absent or blank key.
    /// - `InvalidField` reports the first unparseable value.
    pub fn from_job_data<S: BuildHasher>(
        data: &HashMap<String, String, S>,
    ) -> Result<Self, ConfigError> {
        let missing: Vec<&'static str> = [
            GROUP_KEY,
            LOCATION_KEY,
            SCHEDULE_KEY,
            CHANNEL_KEY,
            DAYS_BACK_KEY,
        ]
        .into_iter()
        .filter(|key| job_value(data, key).is_none())
        .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing));
        }

        let field = |key: &'static str| job_value(data, key).unwrap_or_default();
        Ok(Self {
            group_id: parse_id(GROUP_KEY, field(GROUP_KEY))?,
            location_id: parse_id(LOCATION_KEY, field(LOCATION_KEY))?,
            schedule_id: parse_id(SCHEDULE_KEY, field(SCHEDULE_KEY))?,
            channel_id: parse_id(CHANNEL_KEY, field(CHANNEL_KEY))?,
            look_back_days: parse_days(field(DAYS_BACK_KEY))?,
        })
    }

    /// Parses a JSON object carrying the job data keys.
    ///
    /// String and integer values are accepted; `null` counts as missing.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let document: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)
            .map_err(|err| ConfigError::MalformedDocument(err.to_string()))?;

        let mut data = HashMap::with_capacity(document.len());
        for (key, value) in document {
            let text = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(text) => text,
                serde_json::Value::Number(number) => number.to_string(),
                other => {
                    return Err(ConfigError::MalformedDocument(format!(
                        "value for `{key}` must be a string or number, got {other}"
                    )));
                }
            };
            data.insert(key, text);
        }

        Self::from_job_data(&data)
    }

    /// Earliest creation time of events scanned by a run started at `now`.
    ///
    /// # Errors
    /// - `InvalidField` for `DaysBack` when the window reaches before the
    ///   earliest representable instant.
    pub fn created_cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ConfigError> {
        TimeDelta::try_days(i64::from(self.look_back_days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| ConfigError::InvalidField {
                field: DAYS_BACK_KEY,
                value: self.look_back_days.to_string(),
                reason: "look-back reaches before the earliest representable time",
            })
    }
}

fn job_value<'a, S: BuildHasher>(data: &'a HashMap<String, String, S>, key: &str) -> Option<&'a str> {
    data.get(key)
        .map(|raw| raw.trim())
        .filter(|raw| !raw.is_empty())
}

fn parse_id(field: &'static str, value: &str) -> Result<Uuid, ConfigError> {
    Uuid::parse_str(value).map_err(|_| ConfigError::InvalidField {
        field,
        value: value.to_string(),
        reason: "expected a UUID",
    })
}

fn parse_days(value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidField {
        field: DAYS_BACK_KEY,
        value: value.to_string(),
        reason: "expected a whole number of days >= 0",
    })
}
