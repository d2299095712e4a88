use thiserror::Error;

use crate::app::domain::document::DocumentId;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Store error for {id}: {reason}")]
    Store { id: DocumentId, reason: String },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Section count mismatch: expected {expected}, found {found}")]
    SectionCountMismatch { expected: usize, found: usize },

    #[error("Document {0} contains the section separator")]
    SeparatorCollision(DocumentId),

    #[error("Unknown document: {0}")]
    UnknownDocument(DocumentId),

    #[error("Invalid change {from}..{to}: {reason}")]
    InvalidChange {
        from: usize,
        to: usize,
        reason: &'static str,
    },

    #[error("Composer has been torn down")]
    TornDown,
}

/// Convenience type alias for Results with AppError
pub type Result<T> = std::result::Result<T, AppError>;
