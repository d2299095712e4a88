use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::app::domain::document::DocumentId;
use crate::app::domain::section::{Section, Separator};
use crate::app::domain::settings::UnreadablePolicy;
use crate::app::infrastructure::error::{AppError, Result};
use crate::app::infrastructure::header::{header_title, split_header};
use crate::app::infrastructure::store::DocumentStore;

/// Outcome of one save pass that got past the section count check.
///
/// Writes are attempted independently: a failed write does not undo the
/// ones that succeeded.
#[derive(Debug, Default)]
pub struct SaveReport {
    pub written: Vec<DocumentId>,
    pub failed: Vec<(DocumentId, AppError)>,
    pub unchanged: usize,
}

impl SaveReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A re-read of one section's stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reloaded {
    pub index: usize,
    pub header_block: String,
    pub body: String,
}

/// Builds the composed text from an ordered chapter list and splits it back.
/// Owns the Section records for the lifetime of the composer.
pub struct SectionLoader {
    store: Rc<dyn DocumentStore>,
    separator: Separator,
    policy: UnreadablePolicy,
    sections: Vec<Section>,
}

impl SectionLoader {
    pub fn new(store: Rc<dyn DocumentStore>, separator: Separator, policy: UnreadablePolicy) -> Self {
        Self {
            store,
            separator,
            policy,
            sections: Vec::new(),
        }
    }

    pub fn separator(&self) -> &Separator {
        &self.separator
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section_ids(&self) -> Vec<DocumentId> {
        self.sections.iter().map(|s| s.source_id.clone()).collect()
    }

    pub fn index_of(&self, id: &DocumentId) -> Option<usize> {
        self.sections.iter().position(|s| &s.source_id == id)
    }

    /// Read every document in `order`, keep its header verbatim and return
    /// the bodies joined by the separator.
    pub fn load(&mut self, order: &[DocumentId]) -> Result<String> {
        let mut sections = Vec::with_capacity(order.len());

        for id in order {
            let raw = match self.store.read(id) {
                Ok(raw) => raw,
                Err(e) => match self.policy {
                    UnreadablePolicy::Skip => {
                        warn!("Skipping unreadable document {}: {}", id, e);
                        continue;
                    }
                    UnreadablePolicy::Abort => return Err(e),
                },
            };

            let split = split_header(&raw);
            if self.separator.collides_with(split.body) {
                return Err(AppError::SeparatorCollision(id.clone()));
            }

            sections.push(Section {
                source_id: id.clone(),
                order: sections.len(),
                header_block: split.header.to_string(),
                body: split.body.to_string(),
                display_name: header_title(&split).unwrap_or_else(|| id.stem()),
            });
        }

        let bodies: Vec<&str> = sections.iter().map(|s| s.body.as_str()).collect();
        let composed = self.separator.join(&bodies);
        info!(
            "Composed {} of {} documents ({} bytes)",
            sections.len(),
            order.len(),
            composed.len()
        );

        self.sections = sections;
        Ok(composed)
    }

    /// Split `composed` back into bodies and write every body that differs
    /// from the cached one.
    ///
    /// Aborts with `SectionCountMismatch` before any write when the text no
    /// longer splits into exactly one part per section, and with
    /// `SeparatorCollision` when a part carries the bare token. A buffer
    /// without sections saves nothing.
    pub fn save(&mut self, composed: &str) -> Result<SaveReport> {
        if self.sections.is_empty() {
            return Ok(SaveReport::default());
        }

        let parts = self.separator.split(composed);
        if parts.len() != self.sections.len() {
            warn!(
                "Refusing to save: expected {} sections, found {}",
                self.sections.len(),
                parts.len()
            );
            return Err(AppError::SectionCountMismatch {
                expected: self.sections.len(),
                found: parts.len(),
            });
        }

        if let Some((section, _)) = self
            .sections
            .iter()
            .zip(&parts)
            .find(|(_, part)| self.separator.collides_with(part))
        {
            warn!(
                "Refusing to save: {} contains the bare separator token",
                section.source_id
            );
            return Err(AppError::SeparatorCollision(section.source_id.clone()));
        }

        let mut report = SaveReport::default();
        for (section, part) in self.sections.iter_mut().zip(parts) {
            if section.body == part {
                report.unchanged += 1;
                continue;
            }
            match self.store.replace_body(&section.source_id, part) {
                Ok(()) => {
                    debug!("Wrote {} ({} bytes)", section.source_id, part.len());
                    section.body = part.to_string();
                    report.written.push(section.source_id.clone());
                }
                Err(e) => {
                    warn!("Failed to write {}: {}", section.source_id, e);
                    report.failed.push((section.source_id.clone(), e));
                }
            }
        }

        Ok(report)
    }

    /// Re-read the stored document behind `id`. Does not touch the cache.
    pub fn reload(&self, id: &DocumentId) -> Result<Reloaded> {
        let index = self
            .index_of(id)
            .ok_or_else(|| AppError::UnknownDocument(id.clone()))?;
        let raw = self.store.read(id)?;
        let split = split_header(&raw);
        if self.separator.collides_with(split.body) {
            return Err(AppError::SeparatorCollision(id.clone()));
        }
        Ok(Reloaded {
            index,
            header_block: split.header.to_string(),
            body: split.body.to_string(),
        })
    }

    /// Record a reloaded body as the one matching storage.
    pub fn commit(&mut self, reloaded: Reloaded) {
        if let Some(section) = self.sections.get_mut(reloaded.index) {
            section.header_block = reloaded.header_block;
            section.body = reloaded.body;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::infrastructure::store::MemoryStore;

    fn sep() -> Separator {
        Separator::new("<SEP>", "").unwrap()
    }

    fn ids(names: &[&str]) -> Vec<DocumentId> {
        names.iter().map(|n| DocumentId::from(*n)).collect()
    }

    fn setup(docs: &[(&str, &str)]) -> (Rc<MemoryStore>, SectionLoader) {
        let store = Rc::new(MemoryStore::with_documents(docs.iter().copied()));
        let loader = SectionLoader::new(store.clone(), sep(), UnreadablePolicy::Skip);
        (store, loader)
    }

    #[test]
    fn test_load_composes_bodies() {
        let (_store, mut loader) = setup(&[("Ch1", "Hello"), ("Ch2", "World")]);
        let text = loader.load(&ids(&["Ch1", "Ch2"])).unwrap();
        assert_eq!(text, "Hello<SEP>World");
        assert_eq!(loader.sections().len(), 2);
        assert_eq!(loader.sections()[1].order, 1);
        assert_eq!(loader.sections()[1].display_name, "Ch2");
    }

    #[test]
    fn test_load_keeps_header_verbatim() {
        let raw = "---\ntitle: Opening  # draft\n---\nIt was dark.";
        let (_store, mut loader) = setup(&[("one.md", raw)]);
        let text = loader.load(&ids(&["one.md"])).unwrap();
        assert_eq!(text, "It was dark.");
        let section = &loader.sections()[0];
        assert_eq!(section.header_block, "---\ntitle: Opening  # draft\n---\n");
        assert_eq!(section.display_name, "Opening");
    }

    #[test]
    fn test_round_trip_writes_nothing() {
        let (store, mut loader) = setup(&[
            ("a", "---\nx: 1\n---\nAlpha\n"),
            ("b", "Beta"),
            ("c", ""),
        ]);
        let text = loader.load(&ids(&["a", "b", "c"])).unwrap();
        let report = loader.save(&text).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.unchanged, 3);
        assert!(store.writes().is_empty());
    }

    #[test]
    fn test_save_writes_only_changed_section() {
        let (store, mut loader) = setup(&[("Ch1", "Hello"), ("Ch2", "World")]);
        loader.load(&ids(&["Ch1", "Ch2"])).unwrap();
        let report = loader.save("Hello!<SEP>World").unwrap();
        assert_eq!(report.written, ids(&["Ch1"]));
        assert_eq!(
            store.writes(),
            vec![(DocumentId::from("Ch1"), "Hello!".to_string())]
        );
        assert_eq!(loader.sections()[0].body, "Hello!");

        // the cache now matches, a second save is a no-op
        store.clear_writes();
        loader.save("Hello!<SEP>World").unwrap();
        assert!(store.writes().is_empty());
    }

    #[test]
    fn test_count_mismatch_aborts_without_writes() {
        let (store, mut loader) = setup(&[("a", "A"), ("b", "B"), ("c", "C")]);
        loader.load(&ids(&["a", "b", "c"])).unwrap();
        let err = loader.save("A changed<SEP>B changed C changed").unwrap_err();
        assert!(matches!(
            err,
            AppError::SectionCountMismatch {
                expected: 3,
                found: 2
            }
        ));
        assert!(store.writes().is_empty());
        assert_eq!(loader.sections()[0].body, "A");
    }

    #[test]
    fn test_bare_token_in_part_aborts_without_writes() {
        let store = Rc::new(MemoryStore::with_documents([("a", "A"), ("b", "B")]));
        let sep = Separator::new("<SEP>", "\n\n").unwrap();
        let mut loader = SectionLoader::new(store.clone(), sep, UnreadablePolicy::Skip);
        loader.load(&ids(&["a", "b"])).unwrap();

        // the padded occurrence still splits in two, the bare token does not
        let err = loader.save("A <SEP> x\n\n<SEP>\n\nB2").unwrap_err();
        assert!(matches!(err, AppError::SeparatorCollision(id) if id.as_str() == "a"));
        assert!(store.writes().is_empty());
        assert_eq!(loader.sections()[0].body, "A");
    }

    #[test]
    fn test_save_without_sections_is_a_no_op() {
        let (store, mut loader) = setup(&[("a", "A")]);
        store.fail("a");
        assert_eq!(loader.load(&ids(&["a"])).unwrap(), "");
        let report = loader.save("typed into an empty buffer").unwrap();
        assert!(report.written.is_empty());
        assert!(report.is_clean());
        assert!(store.writes().is_empty());
    }

    #[test]
    fn test_failed_write_keeps_others() {
        let (store, mut loader) = setup(&[("a", "A"), ("b", "B"), ("c", "C")]);
        loader.load(&ids(&["a", "b", "c"])).unwrap();
        store.fail("b");
        let report = loader.save("A1<SEP>B1<SEP>C1").unwrap();
        assert_eq!(report.written, ids(&["a", "c"]));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, DocumentId::from("b"));
        assert!(!report.is_clean());
        // the failed section keeps its old cache so the next save retries it
        assert_eq!(loader.sections()[1].body, "B");
    }

    #[test]
    fn test_unreadable_document_is_skipped() {
        let (store, mut loader) = setup(&[("a", "A"), ("b", "B"), ("c", "C")]);
        store.fail("b");
        let text = loader.load(&ids(&["a", "b", "c"])).unwrap();
        assert_eq!(text, "A<SEP>C");
        assert_eq!(loader.section_ids(), ids(&["a", "c"]));
        assert_eq!(loader.sections()[1].order, 1);
    }

    #[test]
    fn test_unreadable_document_aborts_with_policy() {
        let store = Rc::new(MemoryStore::with_documents([("a", "A")]));
        let mut loader = SectionLoader::new(store, sep(), UnreadablePolicy::Abort);
        let err = loader.load(&ids(&["a", "missing"])).unwrap_err();
        assert!(matches!(err, AppError::UnknownDocument(_)));
        assert!(loader.sections().is_empty());
    }

    #[test]
    fn test_separator_collision_is_rejected() {
        let (_store, mut loader) = setup(&[("a", "A"), ("b", "see <SEP> here")]);
        let err = loader.load(&ids(&["a", "b"])).unwrap_err();
        assert!(matches!(err, AppError::SeparatorCollision(id) if id.as_str() == "b"));
    }

    #[test]
    fn test_reload_and_commit() {
        let (store, mut loader) = setup(&[("a", "A"), ("b", "B")]);
        loader.load(&ids(&["a", "b"])).unwrap();
        store.insert("b", "---\ntitle: Bee\n---\nB2");
        let reloaded = loader.reload(&DocumentId::from("b")).unwrap();
        assert_eq!(reloaded.index, 1);
        assert_eq!(reloaded.body, "B2");
        loader.commit(reloaded);
        assert_eq!(loader.sections()[1].body, "B2");
        assert_eq!(loader.sections()[1].header_block, "---\ntitle: Bee\n---\n");

        assert!(matches!(
            loader.reload(&DocumentId::from("zzz")),
            Err(AppError::UnknownDocument(_))
        ));
    }
}
