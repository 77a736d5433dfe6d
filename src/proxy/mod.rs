//! Scored proxy pool with single-flight refresh
//!
//! The pool hands out random working addresses, adjusts scores on success
//! and failure and evicts proxies that fall below the configured floor.
//! Refreshing sources new candidates from every [`ProxySource`], validates
//! them together with the current working set through a [`ProxyProbe`] and
//! atomically replaces the working set with the survivors.

mod entry;
mod pool;
mod probe;
mod source;

pub use entry::{normalize_address, Proxy, ScorePolicy};
pub use pool::{PoolSettings, ProxyPool};
pub use probe::{HttpProbe, ProxyProbe};
pub use source::{
    parse_address_list, save_addresses, sources_from_config, FileSource, ProxyError, ProxySource, StaticSource,
    TextListSource,
};
