//! Plain data records consumed and produced by the attendance core.
//!
//! # Responsibility
//! - Define the host entities the core reads (group, location, channel,
//!   schedule) as detached values.
//! - Define presence events, check-in windows and attendance records.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Timestamps are UTC seconds since the Unix epoch.
//! - No model type holds a handle into persistence.

pub mod attendance;
pub mod entity;
pub mod presence;
pub mod schedule;

use uuid::Uuid;

/// Stable identifier shared by every host entity.
pub type EntityId = Uuid;
pub type GroupId = EntityId;
pub type LocationId = EntityId;
pub type CampusId = EntityId;
pub type ChannelId = EntityId;
pub type ScheduleId = EntityId;
pub type PersonId = EntityId;

/// UTC seconds since the Unix epoch.
pub type EpochSeconds = i64;
