use super::document::DocumentId;
use crate::app::services::transaction::{Selection, Transaction};

/// Everything that can reach the composer's dispatch loop.
/// The embedding editor forwards its events as one of these; `Composer::handle`
/// processes them one at a time.
#[derive(Debug, Clone)]
pub enum Message {
    // Editing surface
    Edit(Transaction),
    Select(Selection),
    /// Byte offset of the first visible character.
    Scroll(usize),

    // Storage
    DocumentModified(DocumentId),

    // Scheduling
    Tick,
    SaveNow,
    Teardown,
}

/// Outgoing notifications for companion panels and status surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ActiveDocumentChanged { index: usize, id: DocumentId },
    Saved { written: Vec<DocumentId> },
    Warning(String),
}
