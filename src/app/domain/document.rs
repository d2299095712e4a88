use std::fmt;
use std::path::Path;

/// Identity of one stored document, as handed to us by the collection that
/// owns the chapter order. For the filesystem store this is a path relative
/// to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File stem of the id, used as a display name when the header block has
    /// no title.
    ///
    /// Returns "Untitled" if no usable stem can be extracted.
    pub fn stem(&self) -> String {
        Path::new(&self.0)
            .file_stem()
            .and_then(|n| n.to_str())
            .filter(|s| !s.is_empty() && *s != ".")
            .map(|s| s.to_string())
            .unwrap_or_else(|| "Untitled".to_string())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_from_path() {
        assert_eq!(DocumentId::from("book/01-intro.md").stem(), "01-intro");
        assert_eq!(DocumentId::from("Ch1").stem(), "Ch1");
        assert_eq!(DocumentId::from("notes.v2.md").stem(), "notes.v2");
    }

    #[test]
    fn test_stem_edge_cases() {
        assert_eq!(DocumentId::from("").stem(), "Untitled");
        assert_eq!(DocumentId::from("/").stem(), "Untitled");
    }

    #[test]
    fn test_display() {
        assert_eq!(DocumentId::from("a/b.md").to_string(), "a/b.md");
    }
}
