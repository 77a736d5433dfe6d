//! statewalk: a state-graph website traversal engine
//!
//! A site is described as a graph of named states ("catalogue", "product",
//! "image", ...). Each state carries extraction rules that yield new URLs to
//! visit in a follow-up state, and every fetched document becomes a typed item
//! that is routed through a post-processing pipeline. Outbound requests can be
//! spread over a scored proxy pool whose exhaustion pauses request issuance
//! until a single-flight refresh completes.

pub mod config;
pub mod crawler;
pub mod document;
pub mod engine;
pub mod events;
pub mod extract;
pub mod graph;
pub mod item;
pub mod pipeline;
pub mod proxy;
pub mod url;

use thiserror::Error;

/// Main error type for statewalk operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Traversal graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] pipeline::PipelineError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Proxy pool still empty after {attempts} consecutive refreshes")]
    ProxiesExhausted { attempts: u32 },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while building the traversal graph
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("State '{state}' has a callback to undeclared state '{callback}'")]
    InvalidGraph { state: String, callback: String },

    #[error("Unknown extractor class: {0}")]
    UnknownExtractorClass(String),

    #[error("Invalid parameters for extractor '{class}': {message}")]
    InvalidParams { class: String, message: String },
}

/// Errors raised by extractors for a single document
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Cannot extract from non-text document {url} ({content_type})")]
    WrongDocumentKind { url: String, content_type: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for statewalk operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use document::{FetchRequest, FetchedDocument};
pub use engine::{CrawlStrategy, IssuanceGate, Output, RefreshCoordinator};
pub use graph::TraversalGraph;
pub use item::{Item, ItemBuilder, ItemKind};
pub use pipeline::{Pipeline, PostProcessor};
pub use proxy::{Proxy, ProxyPool};
pub use self::url::{canonicalize_url, dedup_key, extract_domain};
