//! Fetch requests and fetched documents
//!
//! These are the two values exchanged with the fetch engine:
//! - [`FetchRequest`] is a plain value carrying its URL and destination state
//! - [`FetchedDocument`] is what comes back: status, headers and raw bytes,
//!   tagged with the state of the request that produced it

use crate::ExtractError;
use scraper::{Html, Selector};
use std::borrow::Cow;
use std::collections::BTreeMap;
use url::Url;

/// MIME type assumed when a response carries no content type
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Response headers keyed by lowercase name, values in arrival order
pub type Headers = BTreeMap<String, Vec<String>>;

/// Free-form metadata carried from a request to its document
pub type RequestMeta = BTreeMap<String, String>;

/// Request metadata key holding the URL of the page a link was found on
pub const META_SOURCE_PAGE: &str = "source_page";

/// Request metadata key holding alternative text for an image link
pub const META_ALT: &str = "alt";

/// A URL to fetch, tagged with the state its document will be processed in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub state: String,
    pub meta: RequestMeta,
    /// Number of earlier attempts that ended in a proxy failure
    pub attempt: u32,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: state.into(),
            meta: RequestMeta::new(),
            attempt: 0,
        }
    }

    /// Adds a metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Returns a copy of this request for the next attempt
    pub fn retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

/// A fetched response, transient between the fetch engine and the strategy
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// State of the request that produced this document, if known
    pub state: Option<String>,
    pub url: Url,
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub meta: RequestMeta,
}

impl FetchedDocument {
    pub fn new(url: Url, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            state: None,
            url,
            status,
            headers: Headers::new(),
            body: body.into(),
            meta: RequestMeta::new(),
        }
    }

    /// Builds the document answering `request`, carrying its state and metadata
    pub fn for_request(
        request: &FetchRequest,
        url: Url,
        status: u16,
        headers: Headers,
        body: Vec<u8>,
    ) -> Self {
        Self {
            state: Some(request.state.clone()),
            url,
            status,
            headers,
            body,
            meta: request.meta.clone(),
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Appends a header value; names are stored lowercase
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// First value of a header, looked up case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Normalized MIME type: parameters stripped, trimmed, lowercased
    ///
    /// Documents without a content type are treated as `text/html`.
    pub fn mime_type(&self) -> String {
        self.header("content-type")
            .and_then(|value| value.split(';').next())
            .map(|mime| mime.trim().to_ascii_lowercase())
            .filter(|mime| !mime.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
    }

    /// The `charset` parameter of the content type, lowercased
    pub fn charset(&self) -> Option<String> {
        let content_type = self.header("content-type")?;
        content_type.split(';').skip(1).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("charset") {
                let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                (!value.is_empty()).then(|| value.to_ascii_lowercase())
            } else {
                None
            }
        })
    }

    /// Returns true if the body is textual (HTML, XML, JSON or `text/*`)
    pub fn is_text(&self) -> bool {
        let mime = self.mime_type();
        mime.starts_with("text/")
            || mime.ends_with("+xml")
            || mime.ends_with("+json")
            || matches!(
                mime.as_str(),
                "application/xml" | "application/json" | "application/javascript"
            )
    }

    /// Body decoded as text, or `WrongDocumentKind` for binary documents
    pub fn text(&self) -> Result<Cow<'_, str>, ExtractError> {
        if !self.is_text() {
            return Err(ExtractError::WrongDocumentKind {
                url: self.url.to_string(),
                content_type: self.mime_type(),
            });
        }
        Ok(String::from_utf8_lossy(&self.body))
    }

    /// Parses the body as an HTML document
    pub fn html(&self) -> Result<Html, ExtractError> {
        Ok(Html::parse_document(&self.text()?))
    }

    /// URL relative links resolve against: `<base href>` if present, else the document URL
    pub fn base_url(&self, html: &Html) -> Url {
        let Ok(selector) = Selector::parse("base[href]") else {
            return self.url.clone();
        };

        html.select(&selector)
            .next()
            .and_then(|element| element.value().attr("href"))
            .and_then(|href| self.url.join(href.trim()).ok())
            .unwrap_or_else(|| self.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(content_type: Option<&str>, body: &str) -> FetchedDocument {
        let doc = FetchedDocument::new(
            Url::parse("https://example.com/page.html").unwrap(),
            200,
            body.as_bytes().to_vec(),
        );
        match content_type {
            Some(value) => doc.with_header("Content-Type", value),
            None => doc,
        }
    }

    #[test]
    fn test_mime_type_normalized() {
        let doc = document(Some("Text/HTML; charset=UTF-8"), "");
        assert_eq!(doc.mime_type(), "text/html");
    }

    #[test]
    fn test_mime_type_defaults_to_html() {
        let doc = document(None, "");
        assert_eq!(doc.mime_type(), "text/html");
        assert!(doc.is_text());
    }

    #[test]
    fn test_charset_parameter() {
        let doc = document(Some("text/html; charset=\"ISO-8859-1\""), "");
        assert_eq!(doc.charset(), Some("iso-8859-1".to_string()));
        assert_eq!(document(Some("text/html"), "").charset(), None);
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let doc = document(Some("image/png"), "");
        assert_eq!(doc.header("CONTENT-TYPE"), Some("image/png"));
        assert_eq!(doc.header("x-missing"), None);
    }

    #[test]
    fn test_binary_document_rejected_as_text() {
        let doc = document(Some("image/png"), "\u{0}PNG");
        assert!(!doc.is_text());
        assert!(matches!(
            doc.text(),
            Err(ExtractError::WrongDocumentKind { content_type, .. }) if content_type == "image/png"
        ));
    }

    #[test]
    fn test_base_href_honoured() {
        let doc = document(
            Some("text/html"),
            r#"<html><head><base href="/assets/"></head><body></body></html>"#,
        );
        let html = doc.html().unwrap();
        assert_eq!(doc.base_url(&html).as_str(), "https://example.com/assets/");
    }

    #[test]
    fn test_base_url_defaults_to_document_url() {
        let doc = document(Some("text/html"), "<html><body></body></html>");
        let html = doc.html().unwrap();
        assert_eq!(doc.base_url(&html), doc.url);
    }

    #[test]
    fn test_document_for_request_carries_state_and_meta() {
        let request = FetchRequest::new("https://example.com/a", "item")
            .with_meta(META_SOURCE_PAGE, "https://example.com/");
        let doc = FetchedDocument::for_request(
            &request,
            Url::parse(&request.url).unwrap(),
            200,
            Headers::new(),
            Vec::new(),
        );
        assert_eq!(doc.state.as_deref(), Some("item"));
        assert_eq!(
            doc.meta.get(META_SOURCE_PAGE).map(String::as_str),
            Some("https://example.com/")
        );
    }

    #[test]
    fn test_retry_increments_attempt() {
        let request = FetchRequest::new("https://example.com/a", "item");
        let retried = request.retry();
        assert_eq!(retried.attempt, 1);
        assert_eq!(retried.url, request.url);
    }
}
