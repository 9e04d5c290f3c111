//! Host entities referenced by a run configuration.

use super::{CampusId, ChannelId, GroupId, LocationId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Group that receives created attendance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

/// Physical location whose campus scopes the presence stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    /// A location without a campus cannot be used for attendance population.
    pub campus_id: Option<CampusId>,
}

/// Presence stream (sensor channel) scanned for events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
}

/// Kind of entity a run configuration references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Group,
    Location,
    Schedule,
    Channel,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Group => "group",
            Self::Location => "location",
            Self::Schedule => "schedule",
            Self::Channel => "interaction channel",
        };
        f.write_str(label)
    }
}
