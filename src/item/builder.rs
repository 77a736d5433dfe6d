use super::image::sniff_dimensions;
use super::{generate_id, HtmlItem, ImageItem, Item, ItemBase, ItemError, ItemKind};
use crate::document::{FetchedDocument, META_ALT, META_SOURCE_PAGE};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::trace;

/// Turns the shared fields plus the document into a typed item
pub type ItemConstructor = fn(ItemBase, &FetchedDocument) -> Result<Item, ItemError>;

/// Classifies documents by MIME type and builds typed items
///
/// MIME types without a registered constructor produce generic items.
pub struct ItemBuilder {
    constructors: HashMap<String, ItemConstructor>,
}

impl ItemBuilder {
    /// Creates a builder that turns every document into a generic item
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registers (or replaces) the constructor for a MIME type
    pub fn register(&mut self, mime: &str, constructor: ItemConstructor) {
        self.constructors
            .insert(mime.trim().to_ascii_lowercase(), constructor);
    }

    /// Builds the item for a document fetched in `state`
    ///
    /// No I/O happens here; status and headers are copied into the metadata.
    pub fn from_document(&self, document: &FetchedDocument, state: &str) -> Result<Item, ItemError> {
        let mime = document.mime_type();
        let base = base_item(document, state);

        match self.constructors.get(&mime) {
            Some(constructor) => constructor(base, document),
            None => {
                trace!("No item constructor for '{}', building a generic item", mime);
                generic_item(base, document)
            }
        }
    }
}

impl Default for ItemBuilder {
    fn default() -> Self {
        let mut builder = Self::empty();
        builder.register("text/html", html_item);
        builder.register("application/xhtml+xml", html_item);
        for mime in ["image/jpeg", "image/png", "image/webp", "image/gif"] {
            builder.register(mime, image_item);
        }
        builder
    }
}

fn base_item(document: &FetchedDocument, state: &str) -> ItemBase {
    let url = document.url.to_string();

    let headers: Map<String, Value> = document
        .headers
        .iter()
        .map(|(name, values)| (name.clone(), Value::from(values.clone())))
        .collect();

    let response_meta: Map<String, Value> = document
        .meta
        .iter()
        .map(|(key, value)| (key.clone(), Value::from(value.as_str())))
        .collect();

    let mut metadata = Map::new();
    metadata.insert("url".to_string(), Value::from(url.as_str()));
    metadata.insert("status".to_string(), Value::from(document.status));
    metadata.insert("headers".to_string(), Value::Object(headers));
    metadata.insert("response_meta".to_string(), Value::Object(response_meta));

    ItemBase {
        id: generate_id(&url),
        state: state.to_string(),
        url,
        content: document.body.clone(),
        metadata,
    }
}

pub fn generic_item(base: ItemBase, _document: &FetchedDocument) -> Result<Item, ItemError> {
    Ok(Item::Generic(base))
}

pub fn html_item(base: ItemBase, document: &FetchedDocument) -> Result<Item, ItemError> {
    Ok(Item::Html(HtmlItem {
        base,
        encoding: document.charset().unwrap_or_else(|| "utf-8".to_string()),
    }))
}

pub fn image_item(base: ItemBase, document: &FetchedDocument) -> Result<Item, ItemError> {
    if document.body.is_empty() {
        return Err(ItemError::EmptyBody {
            url: base.url,
            kind: ItemKind::Image,
        });
    }

    let (width, height) = sniff_dimensions(&document.body).unwrap_or((0, 0));
    let mime = document.mime_type();
    let format = mime.rsplit('/').next().unwrap_or(&mime).to_string();
    let meta = |key: &str| document.meta.get(key).cloned().unwrap_or_default();

    Ok(Item::Image(ImageItem {
        base,
        width,
        height,
        format,
        alt_text: meta(META_ALT),
        downloaded_at: Utc::now(),
        source_page_url: meta(META_SOURCE_PAGE),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn document(url: &str, content_type: &str, body: Vec<u8>) -> FetchedDocument {
        FetchedDocument::new(Url::parse(url).unwrap(), 200, body)
            .with_header("Content-Type", content_type)
            .with_header("Set-Cookie", "a=1")
            .with_header("Set-Cookie", "b=2")
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 13]);
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&32u32.to_be_bytes());
        bytes.extend_from_slice(&16u32.to_be_bytes());
        bytes
    }

    #[test]
    fn test_html_document_builds_html_item() {
        let doc = document(
            "https://example.com/catalogue/page-1.html",
            "Text/HTML; charset=ISO-8859-1",
            b"<html></html>".to_vec(),
        );
        let item = ItemBuilder::default().from_document(&doc, "catalogue").unwrap();

        assert_eq!(item.kind(), ItemKind::Html);
        assert_eq!(item.id(), "catalogue_page-1.html");
        assert_eq!(item.state(), "catalogue");
        match item {
            Item::Html(html) => assert_eq!(html.encoding, "iso-8859-1"),
            other => panic!("expected html item, got {:?}", other),
        }
    }

    #[test]
    fn test_metadata_copies_status_and_headers() {
        let doc = document("https://example.com/x", "text/html", Vec::new())
            .with_meta(META_SOURCE_PAGE, "https://example.com/");
        let item = ItemBuilder::default().from_document(&doc, "start").unwrap();

        let metadata = item.metadata();
        assert_eq!(metadata["url"], "https://example.com/x");
        assert_eq!(metadata["status"], 200);
        assert_eq!(metadata["headers"]["set-cookie"], serde_json::json!(["a=1", "b=2"]));
        assert_eq!(item.response_meta(META_SOURCE_PAGE), Some("https://example.com/"));
    }

    #[test]
    fn test_unknown_mime_builds_generic_item() {
        let doc = document("https://example.com/file.pdf", "application/pdf", vec![1]);
        let item = ItemBuilder::default().from_document(&doc, "files").unwrap();
        assert_eq!(item.kind(), ItemKind::Generic);
    }

    #[test]
    fn test_image_item_fields() {
        let doc = document("https://example.com/media/cover.png", "image/png", png_bytes())
            .with_meta(META_ALT, "A cover")
            .with_meta(META_SOURCE_PAGE, "https://example.com/book.html");
        let item = ItemBuilder::default().from_document(&doc, "image").unwrap();

        match item {
            Item::Image(image) => {
                assert_eq!((image.width, image.height), (32, 16));
                assert_eq!(image.format, "png");
                assert_eq!(image.alt_text, "A cover");
                assert_eq!(image.source_page_url, "https://example.com/book.html");
            }
            other => panic!("expected image item, got {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_image_has_zero_dimensions() {
        let doc = document("https://example.com/a.webp", "image/webp", b"RIFF....WEBP".to_vec());
        match ItemBuilder::default().from_document(&doc, "image").unwrap() {
            Item::Image(image) => {
                assert_eq!((image.width, image.height), (0, 0));
                assert_eq!(image.format, "webp");
            }
            other => panic!("expected image item, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_image_body_fails() {
        let doc = document("https://example.com/a.jpg", "image/jpeg", Vec::new());
        let result = ItemBuilder::default().from_document(&doc, "image");
        assert!(matches!(result, Err(ItemError::EmptyBody { kind: ItemKind::Image, .. })));
    }

    #[test]
    fn test_register_overrides_mime() {
        let mut builder = ItemBuilder::default();
        builder.register("image/png", generic_item);
        let doc = document("https://example.com/a.png", "image/png", png_bytes());
        assert_eq!(builder.from_document(&doc, "image").unwrap().kind(), ItemKind::Generic);
    }

    #[test]
    fn test_empty_builder_always_generic() {
        let doc = document("https://example.com/", "text/html", Vec::new());
        let item = ItemBuilder::empty().from_document(&doc, "start").unwrap();
        assert_eq!(item.kind(), ItemKind::Generic);
        assert_eq!(item.id(), "index");
    }
}
