//! Front-matter header blocks.
//!
//! A header block is a `---` fenced YAML prefix. It is only ever sliced out of
//! the stored text and written back byte for byte, never re-serialized, so
//! comments, key order and spacing survive a body-only write.

/// A stored document split into its header block and body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSplit<'a> {
    /// The whole header including both fences and the closing line break.
    /// Empty when the document has no header.
    pub header: &'a str,
    /// The YAML between the fences.
    pub fields: &'a str,
    pub body: &'a str,
}

fn is_fence(line: &str, closing: bool) -> bool {
    let line = line.trim_end_matches(['\n', '\r']).trim_end();
    line == "---" || (closing && line == "...")
}

/// Split `raw` into header block and body.
///
/// A document without an opening fence on its first line, or without a
/// closing fence, has no header: the whole text is body.
pub fn split_header(raw: &str) -> HeaderSplit<'_> {
    let none = HeaderSplit {
        header: "",
        fields: "",
        body: raw,
    };

    let mut lines = raw.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return none;
    };
    if !is_fence(first, false) || !first.ends_with('\n') {
        return none;
    }

    let fields_start = first.len();
    let mut offset = fields_start;
    for line in lines {
        if is_fence(line, true) {
            let header_end = offset + line.len();
            return HeaderSplit {
                header: &raw[..header_end],
                fields: &raw[fields_start..offset],
                body: &raw[header_end..],
            };
        }
        offset += line.len();
    }

    none
}

/// The `title` field of a header block, if it has one and it parses.
pub fn header_title(split: &HeaderSplit<'_>) -> Option<String> {
    if split.fields.trim().is_empty() {
        return None;
    }
    match serde_yaml::from_str::<serde_yaml::Value>(split.fields) {
        Ok(value) => value
            .get("title")
            .and_then(|t| t.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        Err(e) => {
            tracing::debug!("Ignoring unparsable header block: {}", e);
            None
        }
    }
}
