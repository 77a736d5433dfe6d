/// Checks if a host belongs to a domain
///
/// `example.com` matches the bare domain and every subdomain of it
/// (`blog.example.com`, `api.v2.example.com`). A leading `*.` or `.` on the
/// pattern is accepted and means the same thing. Both arguments are expected
/// to be lowercase already.
///
/// # Examples
///
/// ```
/// use statewalk::url::matches_domain;
///
/// assert!(matches_domain("example.com", "example.com"));
/// assert!(matches_domain("example.com", "blog.example.com"));
/// assert!(matches_domain("*.example.com", "api.v2.example.com"));
/// assert!(!matches_domain("example.com", "notexample.com"));
/// ```
pub fn matches_domain(pattern: &str, host: &str) -> bool {
    let base = pattern
        .strip_prefix("*.")
        .unwrap_or(pattern)
        .trim_start_matches('.');

    if base.is_empty() {
        return false;
    }

    host == base || host.ends_with(&format!(".{}", base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_domain("example.com", "example.com"));
    }

    #[test]
    fn test_subdomains_match() {
        assert!(matches_domain("example.com", "blog.example.com"));
        assert!(matches_domain("example.com", "a.b.example.com"));
    }

    #[test]
    fn test_partial_suffix_does_not_match() {
        assert!(!matches_domain("example.com", "badexample.com"));
        assert!(!matches_domain("example.com", "example.com.evil.org"));
    }

    #[test]
    fn test_wildcard_and_dot_prefixes() {
        assert!(matches_domain("*.example.com", "example.com"));
        assert!(matches_domain(".example.com", "www.example.com"));
    }

    #[test]
    fn test_empty_pattern() {
        assert!(!matches_domain("", "example.com"));
        assert!(!matches_domain("*.", "example.com"));
    }
}
