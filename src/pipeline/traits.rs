//! Post-processor trait and error types
//!
//! This module defines the interface every post-processor implements and
//! the errors raised while processing items or assembling the pipeline.

use crate::item::{Item, ItemKind};
use std::path::PathBuf;
use thiserror::Error;

/// Errors a processor may raise for a single item
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Processor '{processor}' does not handle {kind} items")]
    UnsupportedKind { processor: String, kind: ItemKind },
}

/// Errors raised while assembling the pipeline from configuration
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unknown processor class '{class}' for state '{state}'")]
    UnknownProcessor { state: String, class: String },

    #[error("Unknown save layout '{0}' (expected 'default' or 'group_by_parent')")]
    UnknownSaveLayout(String),
}

/// Result type for processor operations
pub type ProcessResult<T> = Result<T, ProcessError>;

/// A step of the post-processing pipeline
///
/// Implementations should be thread-safe; the pipeline is shared by every
/// worker of a crawl.
pub trait PostProcessor: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Processes an item
    ///
    /// # Returns
    ///
    /// * `Ok(Some(item))` - the item replaced by a new version
    /// * `Ok(None)` - the item passes on untouched
    /// * `Err(_)` - the processor failed; the pipeline logs it and moves on
    fn process(&self, item: &Item) -> ProcessResult<Option<Item>>;

    /// Returns true if this processor has already handled the item
    fn already_processed(&self, item: &Item) -> bool;
}

/// Where processors created from configuration write their output
#[derive(Debug, Clone)]
pub struct ProcessorContext {
    pub site: String,
    /// Session directory; sites live in subfolders of it
    pub session_dir: PathBuf,
}

impl ProcessorContext {
    pub fn site_dir(&self) -> PathBuf {
        self.session_dir.join(&self.site)
    }
}
