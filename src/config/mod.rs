//! Configuration module for statewalk
//!
//! One TOML file describes one site: crawler limits, user agent, the proxy
//! pool, start URLs, the traversal graph and the processor assignments.
//!
//! # Example
//!
//! ```no_run
//! use statewalk::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("books.toml")).unwrap();
//! println!("{} states declared", config.traversal.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ExtractorConfig, NodeConfig, ProcessorConfig, ProcessorsConfig,
    ProxyConfig, ProxySourceConfig, TraversalConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
