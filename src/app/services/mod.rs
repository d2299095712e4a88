//! Services layer - business operations over the composed text.
//!
//! This module contains the pieces the composer coordinates:
//! - Transactions and selections
//! - Separator boundary index
//! - Section loading and saving
//! - Rendering and decorations

pub mod boundary;
pub mod decorations;
pub mod loader;
pub mod render;
pub mod transaction;
