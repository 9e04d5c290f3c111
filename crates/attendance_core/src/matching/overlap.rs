//! Presence/window overlap test.
//!
//! Both intervals are half-open: `[arrive, depart)` and `[start, end)`.
//! They overlap iff `start < depart && arrive < end`. An event ending
//! exactly when check-in opens, or arriving exactly when it closes, is not
//! attendance.

use crate::model::presence::PresenceEvent;
use crate::model::schedule::ScheduleWindow;

pub fn overlaps(event: &PresenceEvent, window: &ScheduleWindow) -> bool {
    window.start < event.depart && event.arrive < window.end
}

/// First window (in resolver order) the event overlaps.
pub fn first_overlapping<'w>(
    event: &PresenceEvent,
    windows: &'w [ScheduleWindow],
) -> Option<&'w ScheduleWindow> {
    windows.iter().find(|window| overlaps(event, window))
}
