//! URL handling module for statewalk
//!
//! This module provides link resolution, canonicalization, the dedup key used
//! by the crawl strategy, domain extraction and domain matching.

mod canonical;
mod domain;
mod matcher;

// Re-export main functions
pub use canonical::{canonicalize_url, dedup_key};
pub use domain::{extract_domain, url_extension};
pub use matcher::matches_domain;

use ::url::Url;

/// Resolves an href against a base URL
///
/// Returns None if the link should be excluded:
/// - empty or fragment-only hrefs (same page anchors)
/// - javascript:, mailto:, tel: schemes and data: URIs
/// - hrefs that cannot be joined onto the base
/// - non-HTTP(S) URLs after resolution
///
/// # Examples
///
/// ```
/// use url::Url;
/// use statewalk::url::resolve_link;
///
/// let base = Url::parse("https://example.com/dir/page.html").unwrap();
/// let link = resolve_link("../other.html", &base).unwrap();
/// assert_eq!(link.as_str(), "https://example.com/other.html");
/// assert!(resolve_link("mailto:me@example.com", &base).is_none());
/// ```
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/dir/page.html").unwrap()
    }

    #[test]
    fn test_resolve_relative_link() {
        let link = resolve_link("three.html", &base_url()).unwrap();
        assert_eq!(link.as_str(), "https://example.com/dir/three.html");
    }

    #[test]
    fn test_resolve_absolute_link() {
        let link = resolve_link("http://other.org/x", &base_url()).unwrap();
        assert_eq!(link.as_str(), "http://other.org/x");
    }

    #[test]
    fn test_resolve_trims_whitespace() {
        let link = resolve_link("   six.html   ", &base_url()).unwrap();
        assert_eq!(link.as_str(), "https://example.com/dir/six.html");
    }

    #[test]
    fn test_skip_special_schemes() {
        assert!(resolve_link("javascript:void(0)", &base_url()).is_none());
        assert!(resolve_link("JavaScript:alert(1)", &base_url()).is_none());
        assert!(resolve_link("mailto:a@b.com", &base_url()).is_none());
        assert!(resolve_link("tel:+123", &base_url()).is_none());
        assert!(resolve_link("data:text/plain,hi", &base_url()).is_none());
    }

    #[test]
    fn test_skip_fragment_and_empty() {
        assert!(resolve_link("#top", &base_url()).is_none());
        assert!(resolve_link("", &base_url()).is_none());
        assert!(resolve_link("   ", &base_url()).is_none());
    }

    #[test]
    fn test_skip_non_http_after_resolution() {
        assert!(resolve_link("ftp://example.com/file", &base_url()).is_none());
    }
}
