//! Check-in window resolution and overlap matching.
//!
//! # Invariants
//! - Matching is strict half-open: touching endpoints never count.
//! - Window resolution is memoized per calendar date for one run only.

pub mod overlap;
pub mod resolver;

pub use overlap::{first_overlapping, overlaps};
pub use resolver::ScheduleWindowResolver;
