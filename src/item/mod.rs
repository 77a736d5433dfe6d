//! Typed records built from fetched documents
//!
//! An [`Item`] is a tagged union over the kinds the pipeline dispatches on:
//! generic documents, HTML pages and images. All kinds share an
//! [`ItemBase`] holding the identity, origin state, URL, raw content and
//! a JSON metadata object.

mod builder;
mod image;

pub use builder::{generic_item, html_item, image_item, ItemBuilder, ItemConstructor};
pub use image::sniff_dimensions;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Errors raised while building an item from a document
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("Empty body for {kind} item at {url}")]
    EmptyBody { url: String, kind: ItemKind },
}

/// The kind of an item, used as the pipeline's dispatch tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKind {
    Generic,
    Html,
    Image,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Generic => "generic",
            ItemKind::Html => "html",
            ItemKind::Image => "image",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by every item kind
#[derive(Clone, PartialEq)]
pub struct ItemBase {
    /// Deterministic identity derived from the URL
    pub id: String,
    pub state: String,
    pub url: String,
    pub content: Vec<u8>,
    /// `url`, `status`, `headers` and `response_meta` of the source document
    pub metadata: Map<String, Value>,
}

impl fmt::Debug for ItemBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemBase")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("url", &self.url)
            .field("content_len", &self.content.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HtmlItem {
    pub base: ItemBase,
    pub encoding: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageItem {
    pub base: ItemBase,
    /// Pixel width, 0 when the header could not be read
    pub width: u32,
    pub height: u32,
    /// MIME subtype, e.g. `jpeg`
    pub format: String,
    pub alt_text: String,
    pub downloaded_at: DateTime<Utc>,
    pub source_page_url: String,
}

/// A typed record produced from one fetched document
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Generic(ItemBase),
    Html(HtmlItem),
    Image(ImageItem),
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Generic(_) => ItemKind::Generic,
            Item::Html(_) => ItemKind::Html,
            Item::Image(_) => ItemKind::Image,
        }
    }

    pub fn base(&self) -> &ItemBase {
        match self {
            Item::Generic(base) => base,
            Item::Html(html) => &html.base,
            Item::Image(image) => &image.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ItemBase {
        match self {
            Item::Generic(base) => base,
            Item::Html(html) => &mut html.base,
            Item::Image(image) => &mut image.base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn state(&self) -> &str {
        &self.base().state
    }

    pub fn url(&self) -> &str {
        &self.base().url
    }

    pub fn content(&self) -> &[u8] {
        &self.base().content
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.base().metadata
    }

    /// A value the fetch request carried, as copied into `response_meta`
    pub fn response_meta(&self, key: &str) -> Option<&str> {
        self.metadata()
            .get("response_meta")
            .and_then(|meta| meta.get(key))
            .and_then(Value::as_str)
    }

    /// First value of a response header as recorded in the metadata
    pub fn header(&self, name: &str) -> Option<&str> {
        self.metadata()
            .get("headers")
            .and_then(|headers| headers.get(name.to_ascii_lowercase()))
            .and_then(|values| values.get(0))
            .and_then(Value::as_str)
    }
}

/// Derives an item id from a URL: the path with `/` turned into `_`
///
/// Leading underscores are dropped, and the site root maps to `index`.
///
/// # Examples
///
/// ```
/// use statewalk::item::generate_id;
///
/// assert_eq!(generate_id("https://example.com/catalogue/book_1/index.html"),
///            "catalogue_book_1_index.html");
/// assert_eq!(generate_id("https://example.com/"), "index");
/// ```
pub fn generate_id(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };

    let id = path.replace('/', "_").trim_start_matches('_').to_string();
    if id.is_empty() {
        "index".to_string()
    } else {
        id
    }
}
