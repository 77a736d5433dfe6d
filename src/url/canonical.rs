use url::Url;

/// Canonicalizes a URL for link extraction
///
/// # Canonicalization Steps
///
/// 1. Remove fragment (everything after #)
/// 2. Sort query parameters by key, then value (stable for repeated keys)
/// 3. Remove empty query string (trailing ?)
///
/// Parameters are reordered as written; their encoding is never changed.
/// Scheme, host and path are left as the URL parser produced them.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use statewalk::url::canonicalize_url;
///
/// let url = Url::parse("https://example.com/five.html?b=2&a=1#frag").unwrap();
/// assert_eq!(canonicalize_url(&url).as_str(), "https://example.com/five.html?a=1&b=2");
/// ```
pub fn canonicalize_url(url: &Url) -> Url {
    let mut canonical = url.clone();
    canonical.set_fragment(None);

    if let Some(query) = canonical.query().map(str::to_string) {
        let mut params: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();

        if params.is_empty() {
            canonical.set_query(None);
        } else {
            params.sort_by(|a, b| split_param(a).cmp(&split_param(b)));
            canonical.set_query(Some(&params.join("&")));
        }
    }

    canonical
}

fn split_param(param: &str) -> (&str, &str) {
    param.split_once('=').unwrap_or((param, ""))
}

/// Returns the key under which a URL is recorded in the seen set
///
/// Query string and fragment are dropped, so `page?x=1` and `page?x=2#a`
/// share a key. Strings that do not parse as URLs are cut at the first `?`
/// or `#` instead.
pub fn dedup_key(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.into()
        }
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or(raw)
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(raw: &str) -> String {
        canonicalize_url(&Url::parse(raw).unwrap()).to_string()
    }

    #[test]
    fn test_sorts_query_and_drops_fragment() {
        assert_eq!(
            canonical("https://example.com/five.html?b=2&a=1#frag"),
            "https://example.com/five.html?a=1&b=2"
        );
    }

    #[test]
    fn test_repeated_keys_sorted_by_value() {
        assert_eq!(
            canonical("https://example.com/?tag=z&tag=a"),
            "https://example.com/?tag=a&tag=z"
        );
    }

    #[test]
    fn test_query_encoding_preserved() {
        assert_eq!(
            canonical("https://example.com/search?q=a%20b&page=2&tag=c+d"),
            "https://example.com/search?page=2&q=a%20b&tag=c+d"
        );
        assert_eq!(
            canonical("https://example.com/?b=1&&a"),
            "https://example.com/?a&b=1"
        );
    }

    #[test]
    fn test_empty_query_removed() {
        assert_eq!(canonical("https://example.com/page?"), "https://example.com/page");
    }

    #[test]
    fn test_no_query_untouched() {
        assert_eq!(
            canonical("https://example.com/page.html"),
            "https://example.com/page.html"
        );
    }

    #[test]
    fn test_dedup_key_strips_query_and_fragment() {
        assert_eq!(
            dedup_key("https://example.com/item?id=3#reviews"),
            "https://example.com/item"
        );
        assert_eq!(
            dedup_key("https://example.com/item?id=4"),
            dedup_key("https://example.com/item")
        );
    }

    #[test]
    fn test_dedup_key_unparseable_input() {
        assert_eq!(dedup_key("not a url?x=1"), "not a url");
    }
}
