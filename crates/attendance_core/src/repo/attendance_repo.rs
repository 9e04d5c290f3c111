//! Attendance writes and processed-marker updates as one unit of work.
//!
//! # Responsibility
//! - Buffer attendance records and consumed marks produced during a run.
//! - Commit both kinds of write atomically at the end of the run.
//!
//! # Invariants
//! - Nothing reaches the store before `commit`.
//! - `commit` writes everything or nothing.
//! - `discard` drops buffered writes without touching the store.

use super::{parse_uuid_column, RepoError, RepoResult};
use crate::model::attendance::AttendanceRecord;
use crate::model::presence::{PresenceEventId, ProcessedMarker};
use crate::model::GroupId;
use log::debug;
use rusqlite::{params, Connection, Row};

/// Write side of a run.
pub trait AttendanceUnitOfWork {
    /// Buffers a new attendance record.
    fn create_attendance(&mut self, record: AttendanceRecord) -> RepoResult<()>;

    /// Buffers the consumed marker for one presence event.
    fn mark_processed(&mut self, event_id: PresenceEventId) -> RepoResult<()>;

    /// Persists all buffered writes atomically and returns the number of
    /// attendance records written.
    fn commit(&mut self) -> RepoResult<usize>;

    /// Drops all buffered writes.
    fn discard(&mut self);
}

/// SQLite unit of work. Buffers in memory, commits in one transaction.
pub struct SqliteAttendanceUnitOfWork<'conn> {
    conn: &'conn Connection,
    pending_records: Vec<AttendanceRecord>,
    pending_marks: Vec<PresenceEventId>,
}

impl<'conn> SqliteAttendanceUnitOfWork<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            pending_records: Vec::new(),
            pending_marks: Vec::new(),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending_records.len()
    }
}

impl AttendanceUnitOfWork for SqliteAttendanceUnitOfWork<'_> {
    fn create_attendance(&mut self, record: AttendanceRecord) -> RepoResult<()> {
        self.pending_records.push(record);
        Ok(())
    }

    fn mark_processed(&mut self, event_id: PresenceEventId) -> RepoResult<()> {
        self.pending_marks.push(event_id);
        Ok(())
    }

    fn commit(&mut self) -> RepoResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO attendance (
                    uuid,
                    person_uuid,
                    schedule_uuid,
                    campus_uuid,
                    location_uuid,
                    group_uuid,
                    start_at,
                    did_attend,
                    source_event_uuid
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            )?;
            for record in &self.pending_records {
                insert.execute(params![
                    record.id.to_string(),
                    record.person_id.to_string(),
                    record.schedule_id.to_string(),
                    record.campus_id.to_string(),
                    record.location_id.to_string(),
                    record.group_id.to_string(),
                    record.start_at,
                    record.did_attend,
                    record.source_event_id.to_string(),
                ])?;
            }

            let mut mark = tx.prepare(
                "UPDATE presence_events SET processed_marker = ?1 WHERE uuid = ?2;",
            )?;
            for event_id in &self.pending_marks {
                let changed =
                    mark.execute(params![ProcessedMarker::Consumed.as_db(), event_id.to_string()])?;
                if changed == 0 {
                    return Err(RepoError::MissingRow {
                        table: "presence_events",
                        id: *event_id,
                    });
                }
            }
        }
        tx.commit()?;

        let written = self.pending_records.len();
        debug!(
            "event=attendance_commit module=repo status=ok records={} marks={}",
            written,
            self.pending_marks.len()
        );
        self.discard();
        Ok(written)
    }

    fn discard(&mut self) {
        self.pending_records.clear();
        self.pending_marks.clear();
    }
}

/// Loads committed attendance for one group ordered by start time.
pub fn list_attendance_for_group(
    conn: &Connection,
    group_id: GroupId,
) -> RepoResult<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT
            uuid,
            person_uuid,
            schedule_uuid,
            campus_uuid,
            location_uuid,
            group_uuid,
            start_at,
            did_attend,
            source_event_uuid
         FROM attendance
         WHERE group_uuid = ?1
         ORDER BY start_at ASC, uuid ASC;",
    )?;
    let mut rows = stmt.query([group_id.to_string()])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(parse_attendance_row(row)?);
    }
    Ok(records)
}

fn parse_attendance_row(row: &Row<'_>) -> RepoResult<AttendanceRecord> {
    let column = |name: &str| -> RepoResult<uuid::Uuid> {
        let text: String = row.get(name)?;
        parse_uuid_column(&text, &format!("attendance.{name}"))
    };

    Ok(AttendanceRecord {
        id: column("uuid")?,
        person_id: column("person_uuid")?,
        schedule_id: column("schedule_uuid")?,
        campus_id: column("campus_uuid")?,
        location_id: column("location_uuid")?,
        group_id: column("group_uuid")?,
        start_at: row.get("start_at")?,
        did_attend: row.get("did_attend")?,
        source_event_id: column("source_event_uuid")?,
    })
}
