//! Traversal engine
//!
//! - [`CrawlStrategy`]: turns one fetched document into an item plus
//!   follow-up requests, enqueuing every URL at most once per run
//! - [`IssuanceGate`]: backpressure gate checked before each dispatch
//! - [`RefreshCoordinator`]: pauses the gate while the proxy pool refreshes

mod gate;
mod refresh;
mod strategy;

pub use gate::IssuanceGate;
pub use refresh::RefreshCoordinator;
pub use strategy::{CrawlStrategy, Output};
