use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};

use crate::app::domain::document::DocumentId;
use crate::app::infrastructure::error::Result;

/// What the decoration layer shows in place of a block construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    pub html: String,
    pub origin: DocumentId,
}

/// Markup-to-view renderer supplied by the embedding editor.
///
/// `origin` is the document the markup came from; renderers use it to resolve
/// relative links and embedded assets.
pub trait Renderer {
    fn render(&self, markup: &str, origin: &DocumentId) -> Result<RenderedView>;

    /// Drop anything held for views produced so far.
    fn release(&self) {}
}

/// Renders markdown to HTML with pulldown-cmark. Relative image sources are
/// resolved against the originating document's directory.
pub struct HtmlRenderer {
    options: Options,
    root: Option<PathBuf>,
}

impl HtmlRenderer {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            root: None,
        }
    }

    /// Resolve relative image paths below `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn asset_dir(&self, origin: &DocumentId) -> Option<PathBuf> {
        let root = self.root.as_ref()?;
        let doc_dir = Path::new(origin.as_str()).parent().unwrap_or(Path::new(""));
        Some(root.join(doc_dir))
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        Self::new(options)
    }
}

fn is_relative_asset(src: &str) -> bool {
    !(src.is_empty()
        || src.starts_with("http://")
        || src.starts_with("https://")
        || src.starts_with("data:")
        || Path::new(src).is_absolute())
}

impl Renderer for HtmlRenderer {
    fn render(&self, markup: &str, origin: &DocumentId) -> Result<RenderedView> {
        let asset_dir = self.asset_dir(origin);
        let parser = Parser::new_ext(markup, self.options).map(|event| match (&asset_dir, event) {
            (
                Some(dir),
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }),
            ) if is_relative_asset(&dest_url) => {
                let resolved = dir.join(&*dest_url).to_string_lossy().to_string();
                Event::Start(Tag::Image {
                    link_type,
                    dest_url: CowStr::from(resolved),
                    title,
                    id,
                })
            }
            (_, event) => event,
        });

        let mut html_output = String::new();
        html::push_html(&mut html_output, parser);

        Ok(RenderedView {
            html: html_output,
            origin: origin.clone(),
        })
    }
}

/// The composer's rendering lifetime: acquired when the composer opens,
/// released when it is torn down or dropped.
///
/// Views are cached per (origin, markup) so re-walking an unchanged buffer on
/// every cursor move does not re-render every block.
pub struct RenderScope {
    renderer: Box<dyn Renderer>,
    cache: HashMap<u64, RenderedView>,
    released: bool,
}

impl RenderScope {
    pub fn acquire(renderer: Box<dyn Renderer>) -> Self {
        Self {
            renderer,
            cache: HashMap::new(),
            released: false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn cached_views(&self) -> usize {
        self.cache.len()
    }

    pub fn render(&mut self, markup: &str, origin: &DocumentId) -> Result<RenderedView> {
        let key = cache_key(markup, origin);
        if let Some(view) = self.cache.get(&key) {
            return Ok(view.clone());
        }
        let view = self.renderer.render(markup, origin)?;
        self.cache.insert(key, view.clone());
        Ok(view)
    }

    /// Drop every cached view whose key is not in `live`.
    pub fn retain(&mut self, live: &[u64]) {
        self.cache.retain(|key, _| live.contains(key));
    }

    /// Release the cache and the renderer's resources.
    ///
    /// This method is idempotent - safe to call multiple times.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.cache.clear();
        self.renderer.release();
        self.released = true;
    }
}

impl Drop for RenderScope {
    fn drop(&mut self) {
        self.release();
    }
}

pub fn cache_key(markup: &str, origin: &DocumentId) -> u64 {
    let mut hasher = DefaultHasher::new();
    origin.hash(&mut hasher);
    markup.hash(&mut hasher);
    hasher.finish()
}
