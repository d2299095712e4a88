use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use super::error::{AppError, Result};
use super::header::split_header;
use crate::app::domain::document::DocumentId;

/// Storage the composer reads chapters from and writes bodies back to.
///
/// `replace_body` must leave the document's header block untouched.
pub trait DocumentStore {
    fn read(&self, id: &DocumentId) -> Result<String>;
    fn replace_body(&self, id: &DocumentId, body: &str) -> Result<()>;
}

/// Chapters stored as files below a project root. Ids are paths relative to
/// the root.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &DocumentId) -> PathBuf {
        self.root.join(id.as_str())
    }
}

impl DocumentStore for FsStore {
    fn read(&self, id: &DocumentId) -> Result<String> {
        Ok(fs::read_to_string(self.path_for(id))?)
    }

    fn replace_body(&self, id: &DocumentId, body: &str) -> Result<()> {
        let path = self.path_for(id);
        let current = fs::read_to_string(&path)?;
        let header = split_header(&current).header;

        let mut contents = String::with_capacity(header.len() + body.len());
        contents.push_str(header);
        contents.push_str(body);
        fs::write(&path, contents)?;
        Ok(())
    }
}

/// In-memory store. Records every body write so callers can assert exactly
/// which chapters were persisted.
#[derive(Default)]
pub struct MemoryStore {
    documents: RefCell<HashMap<DocumentId, String>>,
    writes: RefCell<Vec<(DocumentId, String)>>,
    failing: RefCell<HashSet<DocumentId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents<I, K, V>(docs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<DocumentId>,
        V: Into<String>,
    {
        let store = Self::new();
        for (id, raw) in docs {
            store.insert(id, raw);
        }
        store
    }

    /// Set a document's full text without recording a write, as an external
    /// editor would.
    pub fn insert(&self, id: impl Into<DocumentId>, raw: impl Into<String>) {
        self.documents.borrow_mut().insert(id.into(), raw.into());
    }

    /// Make reads and writes of `id` fail until cleared.
    pub fn fail(&self, id: impl Into<DocumentId>) {
        self.failing.borrow_mut().insert(id.into());
    }

    pub fn clear_failures(&self) {
        self.failing.borrow_mut().clear();
    }

    pub fn get(&self, id: &DocumentId) -> Option<String> {
        self.documents.borrow().get(id).cloned()
    }

    pub fn writes(&self) -> Vec<(DocumentId, String)> {
        self.writes.borrow().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.borrow_mut().clear();
    }

    fn check_failing(&self, id: &DocumentId) -> Result<()> {
        if self.failing.borrow().contains(id) {
            return Err(AppError::Store {
                id: id.clone(),
                reason: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, id: &DocumentId) -> Result<String> {
        self.check_failing(id)?;
        self.documents
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::UnknownDocument(id.clone()))
    }

    fn replace_body(&self, id: &DocumentId, body: &str) -> Result<()> {
        self.check_failing(id)?;
        let mut documents = self.documents.borrow_mut();
        let raw = documents
            .get_mut(id)
            .ok_or_else(|| AppError::UnknownDocument(id.clone()))?;
        let header_len = split_header(raw).header.len();
        raw.truncate(header_len);
        raw.push_str(body);
        self.writes.borrow_mut().push((id.clone(), body.to_string()));
        Ok(())
    }
}
