//! Domain layer - core data structures and types.
//!
//! This module contains the fundamental domain models:
//! - DocumentId
//! - Section and the Separator that delimits sections
//! - Composer settings
//! - Message types for the event loop

pub mod document;
pub mod messages;
pub mod section;
pub mod settings;

pub use document::DocumentId;
pub use messages::{Message, Notification};
pub use section::{Section, Separator};
pub use settings::{ComposerSettings, UnreadablePolicy};
