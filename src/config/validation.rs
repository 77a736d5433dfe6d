use crate::config::types::{
    Config, CrawlerConfig, ProcessorsConfig, ProxyConfig, ProxySourceConfig, TraversalConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use std::collections::BTreeMap;
use url::Url;

/// Validates the entire configuration
///
/// Graph-level checks (callback targets, extractor classes and parameters)
/// happen when the traversal graph is built.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_proxy_config(&config.proxy)?;
    validate_traversal(&config.traversal)?;
    validate_start_urls(&config.start_urls, &config.traversal)?;
    validate_processors(&config.processors, &config.traversal)?;
    Ok(())
}

/// Validates the site name, which becomes a folder name
fn validate_site(site: &str) -> Result<(), ConfigError> {
    if site.is_empty() {
        return Err(ConfigError::Validation("site cannot be empty".to_string()));
    }

    if !site
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        || site.starts_with('.')
    {
        return Err(ConfigError::Validation(format!(
            "site must contain only alphanumeric characters, '-', '_' and '.', got '{}'",
            site
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.request_timeout < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be >= 100ms, got {}ms",
            config.request_timeout
        )));
    }

    if config.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    if let Some(code) = config.ban_codes.iter().find(|c| !(100..=599).contains(*c)) {
        return Err(ConfigError::Validation(format!(
            "ban_codes must be HTTP status codes, got {}",
            code
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates proxy configuration; a disabled pool is not checked further
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    if config.min_score >= config.max_score {
        return Err(ConfigError::Validation(format!(
            "proxy min_score ({}) must be below max_score ({})",
            config.min_score, config.max_score
        )));
    }

    if config.success_gain <= 0 || config.failure_penalty <= 0 {
        return Err(ConfigError::Validation(format!(
            "proxy success_gain and failure_penalty must be positive, got {} and {}",
            config.success_gain, config.failure_penalty
        )));
    }

    if config.probe_concurrency < 1 {
        return Err(ConfigError::Validation(
            "proxy probe_concurrency must be >= 1".to_string(),
        ));
    }

    if config.probe_timeout < 100 {
        return Err(ConfigError::Validation(format!(
            "proxy probe_timeout must be >= 100ms, got {}ms",
            config.probe_timeout
        )));
    }

    if config.max_refresh_attempts < 1 {
        return Err(ConfigError::Validation(
            "proxy max_refresh_attempts must be >= 1".to_string(),
        ));
    }

    validate_http_url("proxy probe_url", &config.probe_url)?;

    if config.sources.is_empty() {
        return Err(ConfigError::Validation(
            "proxy pool is enabled but no [[proxy.sources]] are configured".to_string(),
        ));
    }

    for source in &config.sources {
        if let ProxySourceConfig::TextList { url } = source {
            validate_http_url("proxy source url", url)?;
        }
    }

    Ok(())
}

/// Validates that the traversal declares at least one state
fn validate_traversal(traversal: &TraversalConfig) -> Result<(), ConfigError> {
    if traversal.is_empty() {
        return Err(ConfigError::Validation(
            "traversal must declare at least one state".to_string(),
        ));
    }
    Ok(())
}

/// Validates start URLs: declared states and parseable HTTP(S) URLs
fn validate_start_urls(
    start_urls: &BTreeMap<String, String>,
    traversal: &TraversalConfig,
) -> Result<(), ConfigError> {
    if start_urls.is_empty() {
        return Err(ConfigError::Validation(
            "start-urls must contain at least one entry".to_string(),
        ));
    }

    for (state, url) in start_urls {
        if !traversal.contains_key(state) {
            return Err(ConfigError::Validation(format!(
                "start URL state '{}' is not declared in the traversal",
                state
            )));
        }
        validate_http_url(&format!("start URL for '{}'", state), url)?;
    }

    Ok(())
}

/// Validates processor assignments
fn validate_processors(
    processors: &ProcessorsConfig,
    traversal: &TraversalConfig,
) -> Result<(), ConfigError> {
    for (state, assignments) in processors {
        if !traversal.contains_key(state) {
            return Err(ConfigError::Validation(format!(
                "processors assigned to undeclared state '{}'",
                state
            )));
        }

        if let Some(empty) = assignments.iter().find(|a| a.class.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "processor for state '{}' has an empty class (method '{}')",
                state, empty.method
            )));
        }
    }
    Ok(())
}

fn validate_http_url(what: &str, raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use HTTP or HTTPS",
            what, raw
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
