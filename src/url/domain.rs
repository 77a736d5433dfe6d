use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use statewalk::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the lowercase extension of the last path segment, without the dot
///
/// `https://example.com/files/Report.PDF` yields `Some("pdf")`; a path whose
/// last segment has no dot yields `None`.
pub fn url_extension(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.last()?;
    let (stem, extension) = segment.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("http://127.0.0.1:8080/page").unwrap();
        assert_eq!(extract_domain(&url), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_extension_lowercased() {
        let url = Url::parse("https://example.com/files/Report.PDF?x=1").unwrap();
        assert_eq!(url_extension(&url), Some("pdf".to_string()));
    }

    #[test]
    fn test_no_extension() {
        let url = Url::parse("https://example.com/files/report").unwrap();
        assert_eq!(url_extension(&url), None);
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(url_extension(&url), None);
    }

    #[test]
    fn test_dotfile_has_no_extension() {
        let url = Url::parse("https://example.com/.hidden").unwrap();
        assert_eq!(url_extension(&url), None);
    }
}
