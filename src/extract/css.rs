use super::Extractor;
use crate::document::FetchedDocument;
use crate::{ExtractError, GraphError};
use scraper::Selector;
use serde::Deserialize;
use tracing::debug;

/// Parameters of the `css_get` and `css_getall` classes
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CssParams {
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub attrs: Vec<String>,
}

/// Whether a selector extractor keeps the first match or every match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssMode {
    First,
    All,
}

/// Extracts attribute values of elements matched by CSS selectors
///
/// Every (selector, attribute) pair is visited in selector-major,
/// attribute-minor order. Values are resolved against the document base URL.
#[derive(Debug)]
pub struct CssExtractor {
    mode: CssMode,
    selectors: Vec<Selector>,
    attrs: Vec<String>,
}

impl CssExtractor {
    /// Builds the extractor, parsing every selector up front
    pub fn new(class: &str, mode: CssMode, params: CssParams) -> Result<Self, GraphError> {
        let selectors = params
            .selectors
            .iter()
            .map(|raw| {
                Selector::parse(raw).map_err(|e| GraphError::InvalidParams {
                    class: class.to_string(),
                    message: format!("invalid selector '{}': {:?}", raw, e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            mode,
            selectors,
            attrs: params.attrs,
        })
    }

    pub fn mode(&self) -> CssMode {
        self.mode
    }
}

impl Extractor for CssExtractor {
    fn extract(&self, document: &FetchedDocument) -> Result<Vec<String>, ExtractError> {
        let html = document.html()?;
        let base = document.base_url(&html);
        let mut results = Vec::new();

        for selector in &self.selectors {
            for attr in &self.attrs {
                let mut values = html
                    .select(selector)
                    .filter_map(|element| element.value().attr(attr))
                    .map(str::trim);

                let picked: Vec<&str> = match self.mode {
                    CssMode::First => values.next().into_iter().collect(),
                    CssMode::All => values.collect(),
                };

                for value in picked.into_iter().filter(|v| !v.is_empty()) {
                    match base.join(value) {
                        Ok(resolved) => results.push(resolved.to_string()),
                        Err(e) => debug!("Skipping unresolvable value '{}': {}", value, e),
                    }
                }
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn gallery() -> FetchedDocument {
        FetchedDocument::new(
            Url::parse("https://example.com/gallery/").unwrap(),
            200,
            r#"<html><body>
                <img src="a.jpg" alt="first">
                <img src="b.jpg" data-full="/full/b.jpg">
                <a class="next" href="?page=2">next</a>
            </body></html>"#,
        )
        .with_header("content-type", "text/html; charset=utf-8")
    }

    fn params(selectors: &[&str], attrs: &[&str]) -> CssParams {
        CssParams {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            attrs: attrs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_getall_returns_every_match_in_order() {
        let extractor =
            CssExtractor::new("css_getall", CssMode::All, params(&["img"], &["src"])).unwrap();
        assert_eq!(
            extractor.extract(&gallery()).unwrap(),
            vec![
                "https://example.com/gallery/a.jpg",
                "https://example.com/gallery/b.jpg"
            ]
        );
    }

    #[test]
    fn test_get_returns_first_match() {
        let extractor =
            CssExtractor::new("css_get", CssMode::First, params(&["img"], &["src"])).unwrap();
        assert_eq!(
            extractor.extract(&gallery()).unwrap(),
            vec!["https://example.com/gallery/a.jpg"]
        );
    }

    #[test]
    fn test_selector_major_attribute_minor_order() {
        let extractor = CssExtractor::new(
            "css_getall",
            CssMode::All,
            params(&["img", "a.next"], &["data-full", "href"]),
        )
        .unwrap();
        assert_eq!(
            extractor.extract(&gallery()).unwrap(),
            vec![
                "https://example.com/full/b.jpg",
                "https://example.com/gallery/?page=2"
            ]
        );
    }

    #[test]
    fn test_empty_params_yield_nothing() {
        let extractor = CssExtractor::new("css_getall", CssMode::All, params(&[], &["src"])).unwrap();
        assert!(extractor.extract(&gallery()).unwrap().is_empty());
        let extractor = CssExtractor::new("css_getall", CssMode::All, params(&["img"], &[])).unwrap();
        assert!(extractor.extract(&gallery()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let result = CssExtractor::new("css_get", CssMode::First, params(&["img[["], &["src"]));
        assert!(matches!(result, Err(GraphError::InvalidParams { class, .. }) if class == "css_get"));
    }

    #[test]
    fn test_binary_document_rejected() {
        let extractor =
            CssExtractor::new("css_get", CssMode::First, params(&["img"], &["src"])).unwrap();
        let image = FetchedDocument::new(Url::parse("https://example.com/a.jpg").unwrap(), 200, vec![0xFF, 0xD8])
            .with_header("content-type", "image/jpeg");
        assert!(matches!(
            extractor.extract(&image),
            Err(ExtractError::WrongDocumentKind { .. })
        ));
    }
}
