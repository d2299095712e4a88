//! Infrastructure layer - external integrations and utilities.
//!
//! This module contains code that interfaces with external systems:
//! - Document storage
//! - Front-matter header parsing
//! - Error types

pub mod error;
pub mod header;
pub mod store;
