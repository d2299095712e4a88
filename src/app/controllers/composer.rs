use std::cell::OnceCell;
use std::ops::Range;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use similar::{DiffTag, TextDiff};
use tracing::{debug, info, warn};

use super::scheduler::{SaveScheduler, WriteSuppression};
use crate::app::domain::document::DocumentId;
use crate::app::domain::messages::{Message, Notification};
use crate::app::domain::section::{Section, Separator};
use crate::app::domain::settings::ComposerSettings;
use crate::app::infrastructure::error::{AppError, Result};
use crate::app::infrastructure::store::DocumentStore;
use crate::app::services::boundary::BoundaryIndex;
use crate::app::services::decorations::{Decoration, DecorationEngine};
use crate::app::services::loader::{SaveReport, SectionLoader};
use crate::app::services::render::{RenderScope, Renderer};
use crate::app::services::transaction::{Change, Selection, Transaction, TxOrigin};

/// Upper bound for the character diff that narrows a Sync-In patch.
const PATCH_DIFF_TIMEOUT: Duration = Duration::from_millis(200);

/// Non-editable header shown at a section start. The first section's widget
/// is zero-width at offset 0; the others replace a separator occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryWidget {
    pub at: Range<usize>,
    pub section: usize,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncInOutcome {
    /// We wrote this document ourselves a moment ago.
    Suppressed,
    /// The document is not one of the composed sections.
    NotInBuffer,
    Unchanged,
    Patched { section: usize },
}

/// The single editable surface over all sections.
///
/// Every mutation of the composed text goes through `dispatch`, which is
/// never re-entered: user edits, selection moves and Sync-In patches are
/// applied one transaction at a time.
pub struct Composer {
    loader: SectionLoader,
    text: String,
    selection: Selection,
    viewport_top: usize,
    boundaries: OnceCell<BoundaryIndex>,
    engine: DecorationEngine,
    render: RenderScope,
    scheduler: SaveScheduler,
    suppression: WriteSuppression,
    notifier: Sender<Notification>,
    active_section: Option<usize>,
    sticky_label: Option<String>,
    widgets: Vec<BoundaryWidget>,
    decorations: Vec<Decoration>,
    torn_down: bool,
}

fn boundary_index<'a>(
    cell: &'a OnceCell<BoundaryIndex>,
    text: &str,
    separator: &Separator,
) -> &'a BoundaryIndex {
    cell.get_or_init(|| BoundaryIndex::scan(text, separator))
}

impl Composer {
    /// Load `order` from `store` and build the editing surface.
    pub fn open(
        order: &[DocumentId],
        store: Rc<dyn DocumentStore>,
        renderer: Box<dyn Renderer>,
        settings: &ComposerSettings,
        notifier: Sender<Notification>,
    ) -> Result<Self> {
        settings.validate()?;
        let mut loader = SectionLoader::new(store, settings.separator()?, settings.unreadable_policy);
        let text = loader.load(order)?;

        let mut composer = Self {
            loader,
            text,
            selection: Selection::default(),
            viewport_top: 0,
            boundaries: OnceCell::new(),
            engine: DecorationEngine::from_settings(settings),
            render: RenderScope::acquire(renderer),
            scheduler: SaveScheduler::new(settings.save_debounce()),
            suppression: WriteSuppression::new(settings.write_suppression()),
            notifier,
            active_section: None,
            sticky_label: None,
            widgets: Vec::new(),
            decorations: Vec::new(),
            torn_down: false,
        };
        composer.refresh_document();
        composer.refresh_selection();
        Ok(composer)
    }

    pub fn handle(&mut self, message: Message, now: Instant) -> Result<()> {
        self.ensure_open()?;
        match message {
            Message::Edit(tx) => {
                self.dispatch(tx, now)?;
            }
            Message::Select(selection) => {
                self.dispatch(Transaction::select(selection), now)?;
            }
            Message::Scroll(top) => self.scroll_to(top),
            Message::DocumentModified(id) => {
                self.sync_in(&id, now)?;
            }
            Message::Tick => {
                self.tick(now)?;
            }
            Message::SaveNow => {
                self.save_now(now)?;
            }
            Message::Teardown => self.teardown(),
        }
        Ok(())
    }

    // --- Accessors ---

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn sections(&self) -> &[Section] {
        self.loader.sections()
    }

    pub fn active_section(&self) -> Option<usize> {
        self.active_section
    }

    pub fn sticky_label(&self) -> Option<&str> {
        self.sticky_label.as_deref()
    }

    pub fn boundary_widgets(&self) -> &[BoundaryWidget] {
        &self.widgets
    }

    pub fn decorations(&self) -> &[Decoration] {
        &self.decorations
    }

    pub fn is_save_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn render_scope(&self) -> &RenderScope {
        &self.render
    }

    fn boundaries(&self) -> &BoundaryIndex {
        boundary_index(&self.boundaries, &self.text, self.loader.separator())
    }

    /// Current byte span of section `index`, separators excluded.
    pub fn section_span(&self, index: usize) -> Option<Range<usize>> {
        let boundaries = self.boundaries();
        if index >= self.loader.sections().len() {
            return None;
        }
        boundaries.section_span(index)
    }

    /// Section that owns byte `offset`.
    pub fn section_at(&self, offset: usize) -> Option<&Section> {
        let index = self.boundaries().section_at(offset);
        self.loader.sections().get(index)
    }

    // --- Editing ---

    /// Apply one transaction.
    ///
    /// Returns `Ok(false)` when the boundary filter rejected it; the text and
    /// selection are then left exactly as they were.
    pub fn dispatch(&mut self, tx: Transaction, now: Instant) -> Result<bool> {
        self.ensure_open()?;
        tx.validate(&self.text)?;

        let changes_document = tx.changes_document();
        if changes_document && tx.origin != TxOrigin::Sync {
            let boundaries = self.boundaries();
            if let Some(change) = tx.changes.iter().find(|c| boundaries.blocks(c)) {
                debug!(
                    "Rejected edit {}..{}: crosses a section boundary",
                    change.from, change.to
                );
                return Ok(false);
            }
        }

        if changes_document {
            let (text, selection) = tx.apply(&self.text, &self.selection);
            self.text = text;
            self.selection = selection;
            self.boundaries = OnceCell::new();
            self.refresh_document();
            if tx.origin != TxOrigin::Sync {
                self.scheduler.schedule(now);
            }
        } else if let Some(mut selection) = tx.selection {
            selection.clamp(&self.text);
            self.selection = selection;
        }

        self.refresh_selection();
        Ok(true)
    }

    pub fn scroll_to(&mut self, top: usize) {
        self.viewport_top = top.min(self.text.len());
        self.refresh_sticky();
    }

    // --- Sync-Out ---

    /// Run the debounced save if its quiet period has elapsed.
    pub fn tick(&mut self, now: Instant) -> Result<Option<SaveReport>> {
        self.ensure_open()?;
        if self.scheduler.take_due(now) {
            return self.sync_out(now).map(Some);
        }
        Ok(None)
    }

    /// Save immediately, dropping any pending debounce.
    pub fn save_now(&mut self, now: Instant) -> Result<SaveReport> {
        self.ensure_open()?;
        self.scheduler.cancel();
        self.sync_out(now)
    }

    /// Runs to completion inside a single `handle` call, so at most one save
    /// is ever in flight.
    fn sync_out(&mut self, now: Instant) -> Result<SaveReport> {
        match self.loader.save(&self.text) {
            Ok(report) => {
                for id in &report.written {
                    self.suppression.suppress(id.clone(), now);
                }
                for (id, e) in &report.failed {
                    self.notify(Notification::Warning(format!("Could not save {}: {}", id, e)));
                }
                if !report.written.is_empty() {
                    info!("Saved {} chapter(s)", report.written.len());
                    self.notify(Notification::Saved {
                        written: report.written.clone(),
                    });
                }
                Ok(report)
            }
            Err(e) => {
                self.notify(Notification::Warning(format!(
                    "Chapters were not saved: {}",
                    e
                )));
                Err(e)
            }
        }
    }

    // --- Sync-In ---

    /// Bring an externally modified document into the buffer.
    pub fn sync_in(&mut self, id: &DocumentId, now: Instant) -> Result<SyncInOutcome> {
        self.ensure_open()?;
        if self.suppression.is_suppressed(id, now) {
            debug!("Ignoring change notification for our own write to {}", id);
            return Ok(SyncInOutcome::Suppressed);
        }
        if self.loader.index_of(id).is_none() {
            return Ok(SyncInOutcome::NotInBuffer);
        }

        let reloaded = self.loader.reload(id)?;
        let section = reloaded.index;

        let boundaries = self.boundaries();
        let expected = self.loader.sections().len();
        if boundaries.count() + 1 != expected {
            warn!("Cannot patch {}: buffer has lost a section boundary", id);
            return Err(AppError::SectionCountMismatch {
                expected,
                found: boundaries.count() + 1,
            });
        }
        let span = boundaries
            .section_span(section)
            .ok_or_else(|| AppError::UnknownDocument(id.clone()))?;

        let current = &self.text[span.clone()];
        if current == reloaded.body {
            self.loader.commit(reloaded);
            return Ok(SyncInOutcome::Unchanged);
        }

        let change = narrow_change(current, &reloaded.body, span.start);
        let tx = Transaction {
            changes: vec![change],
            selection: None,
            origin: TxOrigin::Sync,
        };
        self.dispatch(tx, now)?;
        self.loader.commit(reloaded);
        info!("Patched section {} from {}", section, id);
        Ok(SyncInOutcome::Patched { section })
    }

    // --- Teardown ---

    /// Stop all scheduling and release rendering resources. Further messages
    /// are refused with `AppError::TornDown`.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.scheduler.cancel();
        self.render.release();
        self.decorations.clear();
        self.widgets.clear();
        self.torn_down = true;
        info!("Composer torn down");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.torn_down {
            return Err(AppError::TornDown);
        }
        Ok(())
    }

    fn notify(&self, notification: Notification) {
        if self.notifier.send(notification).is_err() {
            debug!("Notification receiver dropped");
        }
    }

    // --- Derived state ---

    fn refresh_document(&mut self) {
        let boundaries = boundary_index(&self.boundaries, &self.text, self.loader.separator());
        let sections = self.loader.sections();

        let mut widgets = Vec::with_capacity(sections.len());
        if let Some(first) = sections.first() {
            widgets.push(BoundaryWidget {
                at: 0..0,
                section: 0,
                label: first.display_name.clone(),
            });
        }
        for (i, occurrence) in boundaries.occurrences().iter().enumerate() {
            let label = sections
                .get(i + 1)
                .map_or_else(|| "Unknown section".to_string(), |s| s.display_name.clone());
            widgets.push(BoundaryWidget {
                at: occurrence.clone(),
                section: i + 1,
                label,
            });
        }
        self.widgets = widgets;
        self.refresh_sticky();
    }

    /// Counts occurrences starting before the viewport top; a viewport that
    /// starts inside a separator names the section after it.
    fn refresh_sticky(&mut self) {
        let top = self.viewport_top;
        let index = self
            .boundaries()
            .occurrences()
            .partition_point(|occ| occ.start < top);
        self.sticky_label = self
            .loader
            .sections()
            .get(index)
            .map(|s| s.display_name.clone());
    }

    fn refresh_selection(&mut self) {
        let boundaries = boundary_index(&self.boundaries, &self.text, self.loader.separator());

        let mut changed = None;
        if let Some(last) = self.loader.sections().len().checked_sub(1) {
            let index = boundaries.section_at(self.selection.caret()).min(last);
            if self.active_section != Some(index) {
                self.active_section = Some(index);
                let id = self.loader.sections()[index].source_id.clone();
                debug!("Active section is now {} ({})", index, id);
                changed = Some(Notification::ActiveDocumentChanged { index, id });
            }
        }

        let carets: Vec<usize> = self.selection.carets().collect();
        let origins = self.loader.section_ids();
        self.decorations =
            self.engine
                .decorate(&self.text, boundaries, &origins, &carets, &mut self.render);

        if let Some(notification) = changed {
            self.notify(notification);
        }
    }
}

/// The smallest replacement inside a section span that turns `old` into
/// `new`. Keeps carets inside the section but outside the edited region in
/// place.
fn narrow_change(old: &str, new: &str, offset: usize) -> Change {
    let diff = TextDiff::configure()
        .timeout(PATCH_DIFF_TIMEOUT)
        .diff_chars(old, new);
    let ops = diff.ops();
    let mut changed = ops.iter().filter(|op| op.tag() != DiffTag::Equal);

    let Some(first) = changed.next() else {
        return Change {
            from: offset,
            to: offset + old.len(),
            insert: new.to_string(),
        };
    };
    let last = changed.last().unwrap_or(first);

    let old_start = char_to_byte(old, first.old_range().start);
    let old_end = char_to_byte(old, last.old_range().end);
    let new_start = char_to_byte(new, first.new_range().start);
    let new_end = char_to_byte(new, last.new_range().end);

    Change {
        from: offset + old_start,
        to: offset + old_end,
        insert: new[new_start..new_end].to_string(),
    }
}

fn char_to_byte(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map_or(text.len(), |(i, _)| i)
}
