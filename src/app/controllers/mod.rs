//! Controllers layer - orchestration and coordination.
//!
//! This module contains controllers that coordinate between
//! domain models, services, and storage:
//! - The composer (editing surface, Sync-Out, Sync-In)
//! - Save debouncing and write suppression

pub mod composer;
pub mod scheduler;
