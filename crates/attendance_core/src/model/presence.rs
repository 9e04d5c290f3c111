//! Presence event model.
//!
//! # Responsibility
//! - Represent presence events exactly as the event store returns them.
//! - Decode the sensor payload into arrival/departure timestamps.
//!
//! # Invariants
//! - A decoded `PresenceEvent` always satisfies `arrive <= depart`.
//! - Events are immutable except for `marker`.
//! - `ProcessedMarker::Consumed` is the only value excluded from fetches.

use super::{CampusId, ChannelId, EpochSeconds, PersonId};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type PresenceEventId = Uuid;

/// Persisted sentinel for events already turned into attendance.
pub const CONSUMED_MARKER: &str = "attendance_populated";

/// Consumption state of one presence event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessedMarker {
    /// Eligible for matching on every run until it ages out.
    #[default]
    Unprocessed,
    /// Attendance was created from this event; never fetched again.
    Consumed,
}

impl ProcessedMarker {
    /// Reads the stored marker column. Anything but the sentinel is unprocessed.
    pub fn from_db(value: Option<&str>) -> Self {
        match value {
            Some(CONSUMED_MARKER) => Self::Consumed,
            _ => Self::Unprocessed,
        }
    }

    pub fn as_db(self) -> Option<&'static str> {
        match self {
            Self::Unprocessed => None,
            Self::Consumed => Some(CONSUMED_MARKER),
        }
    }

    pub fn is_consumed(self) -> bool {
        matches!(self, Self::Consumed)
    }
}

/// Sensor payload attached to each presence event.
///
/// Field names follow the vendor wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresencePayload {
    #[serde(rename = "Space", default)]
    pub space: Option<String>,
    #[serde(rename = "Arrive")]
    pub arrive: EpochSeconds,
    #[serde(rename = "Depart")]
    pub depart: EpochSeconds,
    #[serde(rename = "Duration", default)]
    pub duration: Option<i64>,
}

/// Presence event as fetched from the store, payload not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPresenceEvent {
    pub id: PresenceEventId,
    pub channel_id: ChannelId,
    /// Campus the sensor component belongs to.
    pub campus_id: CampusId,
    pub person_id: PersonId,
    pub created_at: EpochSeconds,
    pub payload: String,
    pub marker: ProcessedMarker,
}

/// Presence event with a validated `[arrive, depart)` interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    pub id: PresenceEventId,
    pub channel_id: ChannelId,
    pub campus_id: CampusId,
    pub person_id: PersonId,
    pub arrive: EpochSeconds,
    pub depart: EpochSeconds,
    pub created_at: EpochSeconds,
    /// Sensor space label, diagnostics only.
    pub space: Option<String>,
    pub marker: ProcessedMarker,
}

/// Per-event payload problem. The event is skipped, never marked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceDataError {
    /// Payload is not valid JSON or lacks `Arrive`/`Depart`.
    InvalidPayload {
        event_id: PresenceEventId,
        message: String,
    },
    /// Timestamp cannot be represented as a calendar instant.
    TimestampOutOfRange {
        event_id: PresenceEventId,
        value: EpochSeconds,
    },
    DepartBeforeArrive {
        event_id: PresenceEventId,
        arrive: EpochSeconds,
        depart: EpochSeconds,
    },
}

impl PresenceDataError {
    pub fn event_id(&self) -> PresenceEventId {
        match self {
            Self::InvalidPayload { event_id, .. }
            | Self::TimestampOutOfRange { event_id, .. }
            | Self::DepartBeforeArrive { event_id, .. } => *event_id,
        }
    }
}

impl Display for PresenceDataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPayload { event_id, message } => {
                write!(f, "presence event {event_id} has an invalid payload: {message}")
            }
            Self::TimestampOutOfRange { event_id, value } => write!(
                f,
                "presence event {event_id} has an out-of-range timestamp {value}"
            ),
            Self::DepartBeforeArrive {
                event_id,
                arrive,
                depart,
            } => write!(
                f,
                "presence event {event_id} departs at {depart} before arriving at {arrive}"
            ),
        }
    }
}

impl Error for PresenceDataError {}

impl RawPresenceEvent {
    /// Decodes the sensor payload into a matchable event.
    ///
    /// # Errors
    /// - `InvalidPayload` when the JSON is malformed, `null`, or missing
    ///   `Arrive`/`Depart`.
    /// - `TimestampOutOfRange` when a timestamp has no calendar instant.
    /// - `DepartBeforeArrive` when `Depart < Arrive`.
    pub fn decode(&self) -> Result<PresenceEvent, PresenceDataError> {
        let payload: PresencePayload = serde_json::from_str(&self.payload).map_err(|err| {
            PresenceDataError::InvalidPayload {
                event_id: self.id,
                message: err.to_string(),
            }
        })?;

        for value in [payload.arrive, payload.depart] {
            if DateTime::from_timestamp(value, 0).is_none() {
                return Err(PresenceDataError::TimestampOutOfRange {
                    event_id: self.id,
                    value,
                });
            }
        }

        if payload.depart < payload.arrive {
            return Err(PresenceDataError::DepartBeforeArrive {
                event_id: self.id,
                arrive: payload.arrive,
                depart: payload.depart,
            });
        }

        Ok(PresenceEvent {
            id: self.id,
            channel_id: self.channel_id,
            campus_id: self.campus_id,
            person_id: self.person_id,
            arrive: payload.arrive,
            depart: payload.depart,
            created_at: self.created_at,
            space: payload.space,
            marker: self.marker,
        })
    }
}
