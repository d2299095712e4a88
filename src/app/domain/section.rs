use std::ops::Range;

use regex_lite::Regex;

use super::document::DocumentId;
use crate::app::infrastructure::error::{AppError, Result};

pub const DEFAULT_SEPARATOR_TOKEN: &str = "<!-- chapter-break -->";
pub const DEFAULT_SEPARATOR_PADDING: &str = "\n\n";

/// One stored document as it lives inside the composed buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub source_id: DocumentId,
    /// Position in the composed buffer; fixed for the whole session.
    pub order: usize,
    /// Front-matter block exactly as it appears in the stored document,
    /// including its closing fence and line ending.
    pub header_block: String,
    /// Last body known to match storage. Sync-Out diffs against this.
    pub body: String,
    pub display_name: String,
}

/// The literal marker placed between two adjacent section bodies.
///
/// An occurrence is the token together with its padding on both sides, so the
/// padding belongs to the boundary and never to either body.
///
/// Splitting is exact as long as no body contains the bare token: the token
/// may not overlap itself and may not begin or end with a line break, so a
/// match can only sit where the token was joined in.
#[derive(Debug, Clone)]
pub struct Separator {
    token: String,
    joined: String,
    pattern: Regex,
}

/// Whether some proper prefix of `s` is also a suffix of it.
fn overlaps_itself(s: &str) -> bool {
    (1..s.len()).any(|k| {
        let tail = s.len() - k;
        s.is_char_boundary(k) && s.is_char_boundary(tail) && s[..k] == s[tail..]
    })
}

impl Separator {
    pub fn new(token: &str, padding: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(AppError::Settings("separator token must not be empty".to_string()));
        }
        if token.starts_with(['\n', '\r']) || token.ends_with(['\n', '\r']) {
            return Err(AppError::Settings(
                "separator token must not begin or end with a line break".to_string(),
            ));
        }
        if overlaps_itself(token) {
            return Err(AppError::Settings(format!(
                "separator token {token:?} overlaps itself and cannot be split unambiguously"
            )));
        }
        if padding.chars().any(|c| c != '\n' && c != '\r') {
            return Err(AppError::Settings(
                "separator padding may only contain line breaks".to_string(),
            ));
        }
        let joined = format!("{padding}{token}{padding}");
        let pattern = Regex::new(&regex_lite::escape(&joined))
            .map_err(|e| AppError::Settings(format!("invalid separator: {e}")))?;
        Ok(Self {
            token: token.to_string(),
            joined,
            pattern,
        })
    }

    /// The full text of one occurrence.
    pub fn as_str(&self) -> &str {
        &self.joined
    }

    /// Byte ranges of every occurrence, in order.
    pub fn find_iter<'t>(&'t self, text: &'t str) -> impl Iterator<Item = Range<usize>> + 't {
        self.pattern.find_iter(text).map(|m| m.range())
    }

    pub fn split<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.pattern.split(text).collect()
    }

    pub fn join<S: AsRef<str>>(&self, bodies: &[S]) -> String {
        let mut out = String::new();
        for (i, body) in bodies.iter().enumerate() {
            if i > 0 {
                out.push_str(&self.joined);
            }
            out.push_str(body.as_ref());
        }
        out
    }

    /// True when authored text carries the bare token. Such a body cannot be
    /// composed without corrupting the boundary count.
    pub fn collides_with(&self, body: &str) -> bool {
        body.contains(&self.token)
    }
}

impl Default for Separator {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR_TOKEN, DEFAULT_SEPARATOR_PADDING)
            .expect("default separator is valid")
    }
}
