use super::{Extractor, OneOrMany};
use crate::document::FetchedDocument;
use crate::url::{canonicalize_url, extract_domain, matches_domain, resolve_link, url_extension};
use crate::{ExtractError, GraphError};
use regex::Regex;
use scraper::{ElementRef, Selector};
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use url::Url;

/// Rewrites an extracted URL; returning `None` drops the link
pub type UrlTransform = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Parameters of the `link_extractor` class
///
/// Every list parameter may also be written as a single string.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkParams {
    /// Regexes the absolute URL must match (any of them)
    pub allow: OneOrMany,
    /// Regexes that reject the absolute URL
    pub deny: OneOrMany,
    pub allow_domains: OneOrMany,
    pub deny_domains: OneOrMany,
    /// Extensions, with or without the leading dot, compared case-insensitively
    pub deny_extensions: OneOrMany,
    /// CSS selectors restricting the regions links are taken from
    pub restrict_css: OneOrMany,
    /// Regexes the link text must match (any of them)
    pub restrict_text: OneOrMany,
    pub tags: OneOrMany,
    pub attrs: OneOrMany,
    pub canonicalize: bool,
    pub unique: bool,
    /// Trim whitespace around attribute values; when off it is kept, percent-encoded
    pub strip: bool,
}

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            allow: OneOrMany::default(),
            deny: OneOrMany::default(),
            allow_domains: OneOrMany::default(),
            deny_domains: OneOrMany::default(),
            deny_extensions: OneOrMany::default(),
            restrict_css: OneOrMany::default(),
            restrict_text: OneOrMany::default(),
            tags: OneOrMany::from(&["a", "area"][..]),
            attrs: OneOrMany::from(&["href"][..]),
            canonicalize: false,
            unique: true,
            strip: true,
        }
    }
}

/// Rule-based link extractor
///
/// Scope restriction is applied first. Each candidate is then trimmed,
/// resolved, filtered by domain, extension, regex and link text, passed
/// through the optional transform, canonicalized if enabled, and finally
/// deduplicated preserving first-seen order.
pub struct LinkExtractor {
    allow: Vec<Regex>,
    deny: Vec<Regex>,
    allow_domains: Vec<String>,
    deny_domains: Vec<String>,
    deny_extensions: HashSet<String>,
    restrict: Vec<Selector>,
    restrict_text: Vec<Regex>,
    tags: Option<Selector>,
    attrs: Vec<String>,
    canonicalize: bool,
    unique: bool,
    strip: bool,
    transform: Option<UrlTransform>,
}

impl fmt::Debug for LinkExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkExtractor")
            .field("allow", &self.allow)
            .field("deny", &self.deny)
            .field("allow_domains", &self.allow_domains)
            .field("deny_domains", &self.deny_domains)
            .field("deny_extensions", &self.deny_extensions)
            .field("attrs", &self.attrs)
            .field("canonicalize", &self.canonicalize)
            .field("unique", &self.unique)
            .field("strip", &self.strip)
            .field("transform", &self.transform.is_some())
            .finish_non_exhaustive()
    }
}

impl LinkExtractor {
    pub fn new(class: &str, params: LinkParams) -> Result<Self, GraphError> {
        let invalid = |message: String| GraphError::InvalidParams {
            class: class.to_string(),
            message,
        };

        let compile = |patterns: OneOrMany| {
            patterns
                .into_vec()
                .into_iter()
                .map(|p| Regex::new(&p).map_err(|e| invalid(format!("invalid regex '{}': {}", p, e))))
                .collect::<Result<Vec<_>, _>>()
        };

        let parse_selector = |raw: &str| {
            Selector::parse(raw).map_err(|e| invalid(format!("invalid selector '{}': {:?}", raw, e)))
        };

        let lowercase = |values: OneOrMany| -> Vec<String> {
            values
                .into_vec()
                .into_iter()
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect()
        };

        let restrict = params
            .restrict_css
            .into_vec()
            .iter()
            .map(|raw| parse_selector(raw.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        let tags = params.tags.into_vec();
        let tags = if tags.is_empty() {
            None
        } else {
            Some(parse_selector(&tags.join(", "))?)
        };

        Ok(Self {
            allow: compile(params.allow)?,
            deny: compile(params.deny)?,
            allow_domains: lowercase(params.allow_domains),
            deny_domains: lowercase(params.deny_domains),
            deny_extensions: lowercase(params.deny_extensions)
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .collect(),
            restrict,
            restrict_text: compile(params.restrict_text)?,
            tags,
            attrs: params.attrs.into_vec(),
            canonicalize: params.canonicalize,
            unique: params.unique,
            strip: params.strip,
            transform: None,
        })
    }

    /// Installs a transform applied to every link that passed the filters
    pub fn with_transform(mut self, transform: UrlTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Candidate elements, restricted to the configured scopes
    fn candidates<'a>(&self, html: &'a scraper::Html, tags: &Selector) -> Vec<ElementRef<'a>> {
        if self.restrict.is_empty() {
            return html.select(tags).collect();
        }

        let mut elements = Vec::new();
        let mut visited = HashSet::new();
        for scope in &self.restrict {
            for region in html.select(scope) {
                let own = tags.matches(&region).then_some(region);
                for element in own.into_iter().chain(region.select(tags)) {
                    if visited.insert(element.id()) {
                        elements.push(element);
                    }
                }
            }
        }
        elements
    }

    fn domain_allowed(&self, url: &Url) -> bool {
        if self.allow_domains.is_empty() && self.deny_domains.is_empty() {
            return true;
        }

        let Some(host) = extract_domain(url) else {
            return false;
        };

        if !self.allow_domains.is_empty()
            && !self.allow_domains.iter().any(|d| matches_domain(d, &host))
        {
            return false;
        }

        !self.deny_domains.iter().any(|d| matches_domain(d, &host))
    }

    fn extension_allowed(&self, url: &Url) -> bool {
        match url_extension(url) {
            Some(extension) => !self.deny_extensions.contains(&extension),
            None => true,
        }
    }

    fn pattern_allowed(&self, url: &str) -> bool {
        if !self.allow.is_empty() && !self.allow.iter().any(|re| re.is_match(url)) {
            return false;
        }
        !self.deny.iter().any(|re| re.is_match(url))
    }

    fn text_allowed(&self, element: &ElementRef<'_>) -> bool {
        if self.restrict_text.is_empty() {
            return true;
        }
        let text: String = element.text().collect();
        self.restrict_text.iter().any(|re| re.is_match(&text))
    }

    /// Runs one raw attribute value through the filter chain
    fn accept(&self, raw: &str, element: &ElementRef<'_>, base: &Url) -> Option<String> {
        let raw = if self.strip {
            Cow::Borrowed(raw.trim())
        } else {
            encode_edge_whitespace(raw)
        };

        let url = resolve_link(&raw, base)?;
        if !self.domain_allowed(&url) || !self.extension_allowed(&url) {
            return None;
        }
        if !self.pattern_allowed(url.as_str()) || !self.text_allowed(element) {
            return None;
        }

        let url = match &self.transform {
            Some(transform) => Url::parse(&transform(url.as_str())?).ok()?,
            None => url,
        };

        let url = if self.canonicalize {
            canonicalize_url(&url)
        } else {
            url
        };

        Some(url.into())
    }
}

impl Extractor for LinkExtractor {
    fn extract(&self, document: &FetchedDocument) -> Result<Vec<String>, ExtractError> {
        let html = document.html()?;
        let Some(tags) = &self.tags else {
            return Ok(Vec::new());
        };
        let base = document.base_url(&html);

        let mut links = Vec::new();
        let mut seen = HashSet::new();

        for element in self.candidates(&html, tags) {
            for attr in &self.attrs {
                let Some(raw) = element.value().attr(attr) else {
                    continue;
                };
                let Some(link) = self.accept(raw, &element, &base) else {
                    trace!("Link '{}' filtered out on {}", raw, document.url);
                    continue;
                };
                if self.unique && !seen.insert(link.clone()) {
                    continue;
                }
                links.push(link);
            }
        }

        Ok(links)
    }
}

/// Percent-encodes leading and trailing whitespace, which URL parsing would
/// otherwise drop
fn encode_edge_whitespace(raw: &str) -> Cow<'_, str> {
    let end = raw.trim_end().len();
    let start = raw.len() - raw.trim_start().len();
    if end == 0 || (start == 0 && end == raw.len()) {
        return Cow::Borrowed(&raw[..end]);
    }

    let encode = |s: &str| s.bytes().map(|b| format!("%{:02X}", b)).collect::<String>();
    Cow::Owned(format!("{}{}{}", encode(&raw[..start]), &raw[start..end], encode(&raw[end..])))
}
