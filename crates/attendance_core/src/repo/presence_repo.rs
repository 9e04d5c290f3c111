//! Presence event source.
//!
//! # Responsibility
//! - Fetch unprocessed presence events for one channel and campus.
//!
//! # Invariants
//! - Events carrying the consumed sentinel are never returned.
//! - Only events created at or after the cutoff are returned.
//! - Payloads are returned undecoded; decoding is the caller's concern.

use super::{parse_uuid_column, RepoResult};
use crate::model::presence::{ProcessedMarker, RawPresenceEvent, CONSUMED_MARKER};
use crate::model::{CampusId, ChannelId, EpochSeconds};
use rusqlite::{params, Connection, Row};

/// Source of presence events eligible for matching.
pub trait PresenceEventSource {
    fn fetch_unprocessed_events(
        &self,
        channel_id: ChannelId,
        campus_id: CampusId,
        created_at_or_after: EpochSeconds,
    ) -> RepoResult<Vec<RawPresenceEvent>>;
}

impl<T: PresenceEventSource + ?Sized> PresenceEventSource for &T {
    fn fetch_unprocessed_events(
        &self,
        channel_id: ChannelId,
        campus_id: CampusId,
        created_at_or_after: EpochSeconds,
    ) -> RepoResult<Vec<RawPresenceEvent>> {
        (**self).fetch_unprocessed_events(channel_id, campus_id, created_at_or_after)
    }
}

/// SQLite-backed presence event source.
pub struct SqlitePresenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePresenceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PresenceEventSource for SqlitePresenceRepository<'_> {
    fn fetch_unprocessed_events(
        &self,
        channel_id: ChannelId,
        campus_id: CampusId,
        created_at_or_after: EpochSeconds,
    ) -> RepoResult<Vec<RawPresenceEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, channel_uuid, campus_uuid, person_uuid, payload, created_at, processed_marker
             FROM presence_events
             WHERE channel_uuid = ?1
               AND campus_uuid = ?2
               AND created_at >= ?3
               AND (processed_marker IS NULL OR processed_marker != ?4)
             ORDER BY created_at ASC, uuid ASC;",
        )?;

        let mut rows = stmt.query(params![
            channel_id.to_string(),
            campus_id.to_string(),
            created_at_or_after,
            CONSUMED_MARKER,
        ])?;

        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_presence_row(row)?);
        }
        Ok(events)
    }
}

fn parse_presence_row(row: &Row<'_>) -> RepoResult<RawPresenceEvent> {
    let uuid_text: String = row.get("uuid")?;
    let channel_text: String = row.get("channel_uuid")?;
    let campus_text: String = row.get("campus_uuid")?;
    let person_text: String = row.get("person_uuid")?;
    let marker_text: Option<String> = row.get("processed_marker")?;

    Ok(RawPresenceEvent {
        id: parse_uuid_column(&uuid_text, "presence_events.uuid")?,
        channel_id: parse_uuid_column(&channel_text, "presence_events.channel_uuid")?,
        campus_id: parse_uuid_column(&campus_text, "presence_events.campus_uuid")?,
        person_id: parse_uuid_column(&person_text, "presence_events.person_uuid")?,
        created_at: row.get("created_at")?,
        payload: row.get("payload")?,
        marker: ProcessedMarker::from_db(marker_text.as_deref()),
    })
}
