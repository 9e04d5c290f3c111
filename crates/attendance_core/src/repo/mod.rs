//! Collaborator contracts consumed by the attendance core, with SQLite
//! implementations.
//!
//! # Responsibility
//! - Define the narrow lookup, event-source and unit-of-work traits the
//!   coordinator depends on.
//! - Keep SQL details inside this module.
//!
//! # Invariants
//! - Repositories return detached records, never live handles.
//! - Corrupt persisted rows surface as `RepoError::InvalidData` instead of
//!   being masked.

pub mod attendance_repo;
pub mod entity_repo;
pub mod presence_repo;

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Failure of a collaborator store itself.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// A persisted row could not be read back into a model value.
    InvalidData(String),
    /// A buffered write targeted a row that no longer exists.
    MissingRow {
        table: &'static str,
        id: uuid::Uuid,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRow { table, id } => write!(f, "row {id} not found in {table}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::MissingRow { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn parse_uuid_column(value: &str, column: &str) -> RepoResult<uuid::Uuid> {
    uuid::Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
