//! Edit transactions against the composed buffer.
//!
//! All change positions are byte offsets into the text *before* the
//! transaction, sorted and non-overlapping.

use crate::app::infrastructure::error::{AppError, Result};

/// Who produced a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxOrigin {
    /// Typed by the writer. Subject to the boundary filter, schedules a save.
    #[default]
    User,
    /// A patch applied by Sync-In. Bypasses the boundary filter and never
    /// schedules a save.
    Sync,
    /// Programmatic, untagged. Filtered and saved like a user edit.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub from: usize,
    pub to: usize,
    pub insert: String,
}

impl Change {
    pub fn is_insertion(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRange {
    pub anchor: usize,
    pub head: usize,
}

impl SelectionRange {
    pub fn cursor(pos: usize) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub ranges: Vec<SelectionRange>,
    pub main: usize,
}

impl Selection {
    pub fn cursor(pos: usize) -> Self {
        Self {
            ranges: vec![SelectionRange::cursor(pos)],
            main: 0,
        }
    }

    pub fn range(anchor: usize, head: usize) -> Self {
        Self {
            ranges: vec![SelectionRange { anchor, head }],
            main: 0,
        }
    }

    /// Caret of the main range.
    pub fn caret(&self) -> usize {
        self.ranges
            .get(self.main)
            .or_else(|| self.ranges.first())
            .map_or(0, |r| r.head)
    }

    pub fn carets(&self) -> impl Iterator<Item = usize> + '_ {
        self.ranges.iter().map(|r| r.head)
    }

    fn map(&self, changes: &[Change]) -> Self {
        Self {
            ranges: self
                .ranges
                .iter()
                .map(|r| SelectionRange {
                    anchor: map_position(r.anchor, changes),
                    head: map_position(r.head, changes),
                })
                .collect(),
            main: self.main,
        }
    }

    /// Clamp every position into `0..=len`, moving down to a char boundary.
    pub fn clamp(&mut self, text: &str) {
        for r in &mut self.ranges {
            r.anchor = floor_char_boundary(text, r.anchor);
            r.head = floor_char_boundary(text, r.head);
        }
        if self.ranges.is_empty() {
            self.ranges.push(SelectionRange::cursor(0));
        }
        if self.main >= self.ranges.len() {
            self.main = 0;
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::cursor(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub changes: Vec<Change>,
    /// New selection in post-edit coordinates. When absent the current
    /// selection is mapped through the changes.
    pub selection: Option<Selection>,
    pub origin: TxOrigin,
}

impl Transaction {
    pub fn replace(from: usize, to: usize, insert: impl Into<String>) -> Self {
        Self {
            changes: vec![Change {
                from,
                to,
                insert: insert.into(),
            }],
            ..Default::default()
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at, at, text)
    }

    pub fn delete(from: usize, to: usize) -> Self {
        Self::replace(from, to, "")
    }

    pub fn select(selection: Selection) -> Self {
        Self {
            selection: Some(selection),
            ..Default::default()
        }
    }

    pub fn with_origin(mut self, origin: TxOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn changes_document(&self) -> bool {
        self.changes
            .iter()
            .any(|c| c.from != c.to || !c.insert.is_empty())
    }

    /// Check positions against `text`: in bounds, on char boundaries, sorted
    /// and non-overlapping.
    pub fn validate(&self, text: &str) -> Result<()> {
        let mut last_end = 0;
        for change in &self.changes {
            let invalid = |reason| AppError::InvalidChange {
                from: change.from,
                to: change.to,
                reason,
            };
            if change.from > change.to {
                return Err(invalid("reversed range"));
            }
            if change.to > text.len() {
                return Err(invalid("out of bounds"));
            }
            if !text.is_char_boundary(change.from) || !text.is_char_boundary(change.to) {
                return Err(invalid("not on a char boundary"));
            }
            if change.from < last_end {
                return Err(invalid("overlaps a previous change"));
            }
            last_end = change.to;
        }
        Ok(())
    }

    /// Apply to `text`, returning the new text and the resulting selection.
    pub fn apply(&self, text: &str, current: &Selection) -> (String, Selection) {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for change in &self.changes {
            out.push_str(&text[cursor..change.from]);
            out.push_str(&change.insert);
            cursor = change.to;
        }
        out.push_str(&text[cursor..]);

        let mut selection = match &self.selection {
            Some(sel) => sel.clone(),
            None => current.map(&self.changes),
        };
        selection.clamp(&out);
        (out, selection)
    }
}

/// Map a pre-edit position to its post-edit position. Positions inside a
/// replaced range land at the end of the inserted text.
pub fn map_position(pos: usize, changes: &[Change]) -> usize {
    let mut delta: isize = 0;
    for change in changes {
        if pos < change.from {
            break;
        }
        if pos < change.to {
            return (change.from as isize + delta) as usize + change.insert.len();
        }
        delta += change.insert.len() as isize - (change.to - change.from) as isize;
    }
    (pos as isize + delta) as usize
}

fn floor_char_boundary(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_single_insert() {
        let tx = Transaction::insert(5, "!");
        let (text, sel) = tx.apply("Hello World", &Selection::cursor(5));
        assert_eq!(text, "Hello! World");
        assert_eq!(sel.caret(), 6);
    }

    #[test]
    fn test_apply_multiple_changes() {
        let tx = Transaction {
            changes: vec![
                Change {
                    from: 0,
                    to: 1,
                    insert: "X".to_string(),
                },
                Change {
                    from: 4,
                    to: 6,
                    insert: String::new(),
                },
            ],
            ..Default::default()
        };
        assert!(tx.validate("abcdefg").is_ok());
        let (text, _) = tx.apply("abcdefg", &Selection::cursor(7));
        assert_eq!(text, "Xbcdg");
    }

    #[test]
    fn test_map_position() {
        let changes = vec![Change {
            from: 3,
            to: 5,
            insert: "xyz".to_string(),
        }];
        assert_eq!(map_position(1, &changes), 1);
        assert_eq!(map_position(3, &changes), 6);
        assert_eq!(map_position(4, &changes), 6);
        assert_eq!(map_position(5, &changes), 6);
        assert_eq!(map_position(8, &changes), 9);
    }

    #[test]
    fn test_insert_before_caret_shifts_it() {
        let tx = Transaction::insert(2, "ab");
        let (_, sel) = tx.apply("0123456", &Selection::cursor(4));
        assert_eq!(sel.caret(), 6);
    }

    #[test]
    fn test_validate_rejects_bad_changes() {
        assert!(Transaction::replace(3, 2, "").validate("abcd").is_err());
        assert!(Transaction::replace(0, 9, "").validate("abcd").is_err());
        assert!(Transaction::replace(1, 1, "").validate("éa").is_err());

        let overlapping = Transaction {
            changes: vec![
                Change {
                    from: 0,
                    to: 3,
                    insert: String::new(),
                },
                Change {
                    from: 2,
                    to: 4,
                    insert: String::new(),
                },
            ],
            ..Default::default()
        };
        assert!(overlapping.validate("abcdef").is_err());
    }

    #[test]
    fn test_explicit_selection_is_clamped() {
        let tx = Transaction::delete(0, 3).with_selection(Selection::cursor(50));
        let (text, sel) = tx.apply("abcdef", &Selection::default());
        assert_eq!(text, "def");
        assert_eq!(sel.caret(), 3);
    }

    #[test]
    fn test_selection_only_transaction() {
        let tx = Transaction::select(Selection::range(1, 3));
        assert!(!tx.changes_document());
        assert!(!Transaction::insert(0, "").changes_document());
    }
}
