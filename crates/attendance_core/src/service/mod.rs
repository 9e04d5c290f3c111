//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate collaborator traits into the attendance population run.
//! - Stay storage-agnostic; SQLite wiring is a convenience entry point only.

pub mod populate_service;
