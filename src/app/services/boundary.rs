use std::ops::Range;

use super::transaction::Change;
use crate::app::domain::section::Separator;

/// Separator occurrences of one buffer revision.
///
/// Derived data only: the composer drops it on every applied transaction and
/// rebuilds it from the text on the next query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryIndex {
    occurrences: Vec<Range<usize>>,
    text_len: usize,
}

impl BoundaryIndex {
    pub fn scan(text: &str, separator: &Separator) -> Self {
        Self {
            occurrences: separator.find_iter(text).collect(),
            text_len: text.len(),
        }
    }

    pub fn occurrences(&self) -> &[Range<usize>] {
        &self.occurrences
    }

    pub fn count(&self) -> usize {
        self.occurrences.len()
    }

    /// Number of occurrences lying entirely before `offset`, which is the
    /// index of the section `offset` belongs to. An offset inside an
    /// occurrence belongs to the section before it.
    pub fn section_at(&self, offset: usize) -> usize {
        self.occurrences.partition_point(|occ| occ.end <= offset)
    }

    /// Byte span of section `index`, excluding the separators around it.
    pub fn section_span(&self, index: usize) -> Option<Range<usize>> {
        if index > self.occurrences.len() {
            return None;
        }
        let start = match index {
            0 => 0,
            i => self.occurrences[i - 1].end,
        };
        let end = self
            .occurrences
            .get(index)
            .map_or(self.text_len, |occ| occ.start);
        Some(start..end)
    }

    /// Whether a change would split, shorten or remove an occurrence.
    ///
    /// A replacement is blocked when it overlaps an occurrence; a pure
    /// insertion only when it lands strictly inside one, so typing at the
    /// very end or start of a section stays possible.
    pub fn blocks(&self, change: &Change) -> bool {
        let first = self.occurrences.partition_point(|occ| occ.end <= change.from);
        self.occurrences[first..]
            .iter()
            .take_while(|occ| occ.start <= change.to)
            .any(|occ| {
                if change.is_insertion() {
                    occ.start < change.from && change.from < occ.end
                } else {
                    change.from < occ.end && change.to > occ.start
                }
            })
    }

    pub fn intersects(&self, range: &Range<usize>) -> bool {
        let first = self.occurrences.partition_point(|occ| occ.end <= range.start);
        self.occurrences
            .get(first)
            .is_some_and(|occ| occ.start < range.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(text: &str) -> BoundaryIndex {
        BoundaryIndex::scan(text, &Separator::new("<SEP>", "").unwrap())
    }

    fn change(from: usize, to: usize) -> Change {
        Change {
            from,
            to,
            insert: "x".to_string(),
        }
    }

    #[test]
    fn test_scan() {
        let idx = index("Hello<SEP>World<SEP>Done");
        assert_eq!(idx.occurrences(), &[5..10, 15..20]);
        assert_eq!(idx.count(), 2);
    }

    #[test]
    fn test_section_at() {
        let idx = index("Hello<SEP>World<SEP>Done");
        assert_eq!(idx.section_at(0), 0);
        assert_eq!(idx.section_at(5), 0);
        assert_eq!(idx.section_at(7), 0);
        assert_eq!(idx.section_at(10), 1);
        assert_eq!(idx.section_at(14), 1);
        assert_eq!(idx.section_at(24), 2);
    }

    #[test]
    fn test_section_span() {
        let idx = index("Hello<SEP>World<SEP>Done");
        assert_eq!(idx.section_span(0), Some(0..5));
        assert_eq!(idx.section_span(1), Some(10..15));
        assert_eq!(idx.section_span(2), Some(20..24));
        assert_eq!(idx.section_span(3), None);

        let single = index("Only");
        assert_eq!(single.section_span(0), Some(0..4));
    }

    #[test]
    fn test_blocks() {
        let idx = index("Hello<SEP>World");
        // insertions at the edges of the separator are allowed
        assert!(!idx.blocks(&change(5, 5)));
        assert!(!idx.blocks(&change(10, 10)));
        assert!(idx.blocks(&change(7, 7)));
        // replacements overlapping any byte are not
        assert!(idx.blocks(&change(4, 6)));
        assert!(idx.blocks(&change(9, 11)));
        assert!(idx.blocks(&change(0, 15)));
        assert!(!idx.blocks(&change(0, 5)));
        assert!(!idx.blocks(&change(10, 15)));
    }

    #[test]
    fn test_intersects() {
        let idx = index("Hello<SEP>World");
        assert!(idx.intersects(&(3..6)));
        assert!(!idx.intersects(&(0..5)));
        assert!(!idx.intersects(&(10..15)));
    }
}
