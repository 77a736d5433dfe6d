//! Extractors pull lists of URL strings out of fetched documents
//!
//! Three classes are registered by default:
//! - `css_get`: first match of every (selector, attribute) pair
//! - `css_getall`: every match of every (selector, attribute) pair
//! - `link_extractor`: rule-based link extraction with allow/deny filters
//!
//! Extractors are built once, from their configuration, when the traversal
//! graph is constructed. Further classes can be added to an
//! [`ExtractorRegistry`] before the graph is built.

mod css;
mod link;
mod registry;

use crate::document::FetchedDocument;
use crate::ExtractError;
use serde::Deserialize;
use std::fmt;

pub use css::{CssExtractor, CssMode, CssParams};
pub use link::{LinkExtractor, LinkParams, UrlTransform};
pub use registry::{ExtractorBuilder, ExtractorRegistry};

/// Pulls a list of strings out of a fetched document
///
/// Implementations are pure: the same document always yields the same list.
pub trait Extractor: Send + Sync + fmt::Debug {
    fn extract(&self, document: &FetchedDocument) -> Result<Vec<String>, ExtractError>;
}

/// A parameter that may be written as a single string or as a list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl From<&[&str]> for OneOrMany {
    fn from(values: &[&str]) -> Self {
        OneOrMany::Many(values.iter().map(|v| v.to_string()).collect())
    }
}
