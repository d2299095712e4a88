//! Cursor-aware decorations over the composed buffer.
//!
//! Every pass re-parses the whole buffer. Block constructs away from every
//! caret are replaced by a rendered view of their source; inline constructs
//! away from every caret get their markers hidden and their content styled.
//! Anything holding a caret stays raw so it can be edited.

use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use tracing::warn;

use super::boundary::BoundaryIndex;
use super::render::{RenderScope, RenderedView, cache_key};
use crate::app::domain::document::DocumentId;
use crate::app::domain::settings::ComposerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Heading(u8),
    BlockQuote,
    Rule,
    Image,
    Table,
    FencedCode,
    Strong,
    Emphasis,
    InlineCode,
    Link,
}

impl NodeKind {
    fn classify(event: &Event<'_>) -> Option<Self> {
        match event {
            Event::Start(Tag::Heading { level, .. }) => Some(Self::Heading(*level as u8)),
            Event::Start(Tag::BlockQuote(_)) => Some(Self::BlockQuote),
            Event::Rule => Some(Self::Rule),
            Event::Start(Tag::Image { .. }) => Some(Self::Image),
            Event::Start(Tag::Table(_)) => Some(Self::Table),
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) => Some(Self::FencedCode),
            Event::Start(Tag::Strong) => Some(Self::Strong),
            Event::Start(Tag::Emphasis) => Some(Self::Emphasis),
            Event::Code(_) => Some(Self::InlineCode),
            Event::Start(Tag::Link { .. }) => Some(Self::Link),
            _ => None,
        }
    }

    pub fn is_block(self) -> bool {
        match self {
            Self::Heading(_)
            | Self::BlockQuote
            | Self::Rule
            | Self::Image
            | Self::Table
            | Self::FencedCode => true,
            Self::Strong | Self::Emphasis | Self::InlineCode | Self::Link => false,
        }
    }

    /// Style class applied to an inline construct's content.
    pub fn class(self) -> &'static str {
        match self {
            Self::Heading(_) => "heading",
            Self::BlockQuote => "blockquote",
            Self::Rule => "rule",
            Self::Image => "image",
            Self::Table => "table",
            Self::FencedCode => "code-block",
            Self::Strong => "strong",
            Self::Emphasis => "emphasis",
            Self::InlineCode => "inline-code",
            Self::Link => "link",
        }
    }

    /// Opening and closing marker lengths of an inline construct, read from
    /// its source text. `None` when the source does not have the expected
    /// shape (reference links, autolinks, ...), which leaves it raw.
    fn markers(self, source: &str) -> Option<(usize, usize)> {
        let bytes = source.as_bytes();
        match self {
            Self::Strong => {
                let delim = source.get(..2)?;
                let ok = (delim == "**" || delim == "__")
                    && source.len() > 4
                    && source.ends_with(delim);
                ok.then_some((2, 2))
            }
            Self::Emphasis => {
                let first = *bytes.first()?;
                let ok = (first == b'*' || first == b'_')
                    && source.len() > 2
                    && bytes.last() == Some(&first);
                ok.then_some((1, 1))
            }
            Self::InlineCode => {
                let open = bytes.iter().take_while(|&&b| b == b'`').count();
                let close = bytes.iter().rev().take_while(|&&b| b == b'`').count();
                (open > 0 && open == close && source.len() > open + close).then_some((open, close))
            }
            Self::Link => {
                if !source.starts_with('[') || !source.ends_with(')') {
                    return None;
                }
                let text_end = source.rfind("](")?;
                (text_end > 1).then_some((1, source.len() - text_end))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoration {
    /// A block construct shown as a rendered view.
    Replace {
        range: Range<usize>,
        kind: NodeKind,
        section: usize,
        view: RenderedView,
    },
    /// Marker characters of an inline construct.
    Hide { range: Range<usize> },
    /// Content of an inline construct.
    Mark {
        range: Range<usize>,
        class: &'static str,
    },
}

impl Decoration {
    pub fn range(&self) -> &Range<usize> {
        match self {
            Self::Replace { range, .. } | Self::Hide { range } | Self::Mark { range, .. } => range,
        }
    }
}

pub struct DecorationEngine {
    options: Options,
}

impl DecorationEngine {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    pub fn from_settings(settings: &ComposerSettings) -> Self {
        let mut options = Options::empty();
        if settings.enable_tables {
            options.insert(Options::ENABLE_TABLES);
        }
        if settings.enable_strikethrough {
            options.insert(Options::ENABLE_STRIKETHROUGH);
        }
        Self::new(options)
    }

    /// Compute the decorations for `text`.
    ///
    /// `origins[i]` is the document behind section `i`. Each block is
    /// rendered on behalf of the section its first byte falls in.
    pub fn decorate(
        &self,
        text: &str,
        boundaries: &BoundaryIndex,
        origins: &[DocumentId],
        carets: &[usize],
        scope: &mut RenderScope,
    ) -> Vec<Decoration> {
        let mut decorations = Vec::new();
        let mut live_views = Vec::new();
        let mut replaced_until = 0;

        for (event, range) in Parser::new_ext(text, self.options).into_offset_iter() {
            let Some(kind) = NodeKind::classify(&event) else {
                continue;
            };
            if range.start < replaced_until {
                continue;
            }
            let range = trim_line_ends(text, range);
            if range.is_empty() || boundaries.intersects(&range) {
                continue;
            }
            if carets.iter().any(|&c| range.start <= c && c <= range.end) {
                continue;
            }

            let source = &text[range.clone()];
            if kind.is_block() {
                let section = boundaries.section_at(range.start);
                let Some(origin) = origins.get(section) else {
                    continue;
                };
                match scope.render(source, origin) {
                    Ok(view) => {
                        live_views.push(cache_key(source, origin));
                        replaced_until = range.end;
                        decorations.push(Decoration::Replace {
                            range,
                            kind,
                            section,
                            view,
                        });
                    }
                    Err(e) => {
                        warn!("Render failed for {:?} at {:?}, showing source: {}", kind, range, e);
                    }
                }
            } else if let Some((open, close)) = kind.markers(source) {
                decorations.push(Decoration::Hide {
                    range: range.start..range.start + open,
                });
                decorations.push(Decoration::Mark {
                    range: range.start + open..range.end - close,
                    class: kind.class(),
                });
                decorations.push(Decoration::Hide {
                    range: range.end - close..range.end,
                });
            }
        }

        scope.retain(&live_views);
        decorations
    }
}

/// Block ranges from the parser include the trailing line break; a caret at
/// the start of the next line must not count as inside the block.
fn trim_line_ends(text: &str, range: Range<usize>) -> Range<usize> {
    let trimmed = text[range.clone()].trim_end_matches(['\n', '\r']);
    range.start..range.start + trimmed.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::domain::section::Separator;
    use crate::app::infrastructure::error::{AppError, Result};
    use crate::app::services::render::{HtmlRenderer, Renderer};

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render(&self, _markup: &str, _origin: &DocumentId) -> Result<RenderedView> {
            Err(AppError::Render("malformed".to_string()))
        }
    }

    fn origins() -> Vec<DocumentId> {
        vec![DocumentId::from("a.md"), DocumentId::from("b.md")]
    }

    fn run(text: &str, carets: &[usize]) -> Vec<Decoration> {
        let separator = Separator::default();
        let boundaries = BoundaryIndex::scan(text, &separator);
        let mut scope = RenderScope::acquire(Box::new(HtmlRenderer::default()));
        DecorationEngine::new(Options::ENABLE_TABLES).decorate(
            text,
            &boundaries,
            &origins(),
            carets,
            &mut scope,
        )
    }

    fn replaced(decorations: &[Decoration]) -> Vec<(NodeKind, usize, String)> {
        decorations
            .iter()
            .filter_map(|d| match d {
                Decoration::Replace {
                    kind, section, view, ..
                } => Some((*kind, *section, view.origin.to_string())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_blocks_resolve_to_their_own_section() {
        let sep = Separator::default();
        let text = sep.join(&["# One\n\nAlpha", "## Two\n\nBeta"]);
        let decorations = run(&text, &[text.len()]);
        assert_eq!(
            replaced(&decorations),
            vec![
                (NodeKind::Heading(1), 0, "a.md".to_string()),
                (NodeKind::Heading(2), 1, "b.md".to_string()),
            ]
        );
    }

    #[test]
    fn test_block_with_caret_stays_raw() {
        let text = "# One\n\nAlpha\n\n> quoted";
        let decorations = run(text, &[3]);
        assert_eq!(
            replaced(&decorations),
            vec![(NodeKind::BlockQuote, 0, "a.md".to_string())]
        );

        // caret on the line after the heading does not hold the heading
        let decorations = run(text, &[6]);
        assert_eq!(replaced(&decorations).len(), 2);
    }

    #[test]
    fn test_block_kinds() {
        let text = "---\n\n```rust\nfn x() {}\n```\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n![pic](p.png)\n";
        let kinds: Vec<NodeKind> = replaced(&run(text, &[text.len() + 1]))
            .into_iter()
            .map(|(k, _, _)| k)
            .collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Rule, NodeKind::FencedCode, NodeKind::Table, NodeKind::Image]
        );
    }

    #[test]
    fn test_inline_markers_hidden() {
        let text = "Some **bold** and _it_ and ``a`b`` and [site](http://x.io) end";
        let decorations = run(text, &[0]);
        let expect = [
            Decoration::Hide { range: 5..7 },
            Decoration::Mark {
                range: 7..11,
                class: "strong",
            },
            Decoration::Hide { range: 11..13 },
            Decoration::Hide { range: 18..19 },
            Decoration::Mark {
                range: 19..21,
                class: "emphasis",
            },
            Decoration::Hide { range: 21..22 },
            Decoration::Hide { range: 27..29 },
            Decoration::Mark {
                range: 29..32,
                class: "inline-code",
            },
            Decoration::Hide { range: 32..34 },
            Decoration::Hide { range: 39..40 },
            Decoration::Mark {
                range: 40..44,
                class: "link",
            },
            Decoration::Hide { range: 44..58 },
        ];
        assert_eq!(decorations, expect);
    }

    #[test]
    fn test_inline_with_caret_stays_raw() {
        let text = "Some **bold** text";
        let decorations = run(text, &[8]);
        assert!(decorations.is_empty());

        // caret right after the closing marker still counts as inside
        let decorations = run(text, &[13]);
        assert!(decorations.is_empty());

        let decorations = run(text, &[14]);
        assert_eq!(decorations.len(), 3);
    }

    #[test]
    fn test_any_caret_blocks_decoration() {
        let text = "**a** and **b**";
        let decorations = run(text, &[1, 100]);
        let marks: Vec<_> = decorations
            .iter()
            .filter(|d| matches!(d, Decoration::Mark { .. }))
            .map(|d| d.range().clone())
            .collect();
        assert_eq!(marks, vec![12..13]);
    }

    #[test]
    fn test_inline_inside_replaced_block_is_skipped() {
        let text = "> a **bold** quote\n\nafter";
        let decorations = run(text, &[text.len()]);
        assert_eq!(decorations.len(), 1);
        assert!(matches!(
            decorations[0],
            Decoration::Replace {
                kind: NodeKind::BlockQuote,
                ..
            }
        ));
    }

    #[test]
    fn test_node_spanning_separator_is_left_raw() {
        let sep = Separator::default();
        let text = sep.join(&["```\nunterminated", "Beta"]);
        let decorations = run(&text, &[text.len()]);
        assert!(replaced(&decorations).is_empty());
    }

    #[test]
    fn test_render_failure_degrades_to_raw() {
        let text = "# Title\n\nSome **bold**";
        let boundaries = BoundaryIndex::scan(text, &Separator::default());
        let mut scope = RenderScope::acquire(Box::new(FailingRenderer));
        let decorations = DecorationEngine::new(Options::empty()).decorate(
            text,
            &boundaries,
            &origins(),
            &[0],
            &mut scope,
        );
        // heading held the caret anyway; bold still decorates
        assert_eq!(decorations.len(), 3);

        let decorations = DecorationEngine::new(Options::empty()).decorate(
            text,
            &boundaries,
            &origins(),
            &[text.len() + 5],
            &mut scope,
        );
        assert!(replaced(&decorations).is_empty());
        assert_eq!(decorations.len(), 3);
    }

    #[test]
    fn test_markers() {
        assert_eq!(NodeKind::Strong.markers("__x__"), Some((2, 2)));
        assert_eq!(NodeKind::Emphasis.markers("*x*"), Some((1, 1)));
        assert_eq!(NodeKind::InlineCode.markers("```a``b```"), Some((3, 3)));
        assert_eq!(NodeKind::Link.markers("[a [b]](u)"), Some((1, 4)));
        assert_eq!(NodeKind::Link.markers("[ref][id]"), None);
        assert_eq!(NodeKind::Link.markers("<http://x>"), None);
    }
}
