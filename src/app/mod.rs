//! Application layer - organized by Clean Architecture principles.
//!
//! # Structure
//!
//! - `domain/` - Core data structures (DocumentId, Section, Settings, Messages)
//! - `controllers/` - Orchestration (Composer, SaveScheduler)
//! - `services/` - Business operations (transactions, loader, decorations)
//! - `infrastructure/` - External integrations (document storage, headers, error)

pub mod controllers;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-exports for convenient external access
pub use controllers::composer::{BoundaryWidget, Composer, SyncInOutcome};
pub use domain::{ComposerSettings, DocumentId, Message, Notification, Section, Separator, UnreadablePolicy};
pub use infrastructure::error::{AppError, Result};
pub use infrastructure::store::{DocumentStore, FsStore, MemoryStore};
pub use services::decorations::{Decoration, NodeKind};
pub use services::loader::SaveReport;
pub use services::render::{HtmlRenderer, RenderedView, Renderer};
pub use services::transaction::{Change, Selection, SelectionRange, Transaction, TxOrigin};
