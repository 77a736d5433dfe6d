//! Post-processing pipeline
//!
//! Items are routed by `(origin state, item kind)` to an ordered list of
//! processors. A failing processor is logged and the item moves on to the
//! next processor unmodified.
//!
//! Processors are assigned per state in the `[processors]` configuration:
//!
//! ```toml
//! [[processors.image]]
//! class = "save"
//! method = "group_by_parent"
//! ```

mod layout;
mod save;
mod traits;

pub use layout::{safe_folder_name, SaveLayout};
pub use save::SaveProcessor;
pub use traits::{
    PipelineError, PostProcessor, ProcessError, ProcessResult, ProcessorContext,
};

use crate::config::ProcessorsConfig;
use crate::events::{record_error, record_success};
use crate::item::{Item, ItemKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Processors a configured class contributes, one entry per item kind it handles
pub type ProcessorSet = Vec<(ItemKind, Arc<dyn PostProcessor>)>;

/// Builds the processors of a class from its `method` and the run context
pub type ProcessorFactory = fn(&str, &ProcessorContext) -> Result<ProcessorSet, PipelineError>;

/// Maps processor class names to factories
pub struct ProcessorRegistry {
    factories: HashMap<String, ProcessorFactory>,
}

impl ProcessorRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, class: impl Into<String>, factory: ProcessorFactory) {
        self.factories.insert(class.into(), factory);
    }

    pub fn get(&self, class: &str) -> Option<ProcessorFactory> {
        self.factories.get(class).copied()
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("save", save_processors);
        registry
    }
}

/// The `save` class: HTML and image items, in the layout named by `method`
fn save_processors(method: &str, context: &ProcessorContext) -> Result<ProcessorSet, PipelineError> {
    let layout = SaveLayout::from_method(method)?;
    let site_dir = context.site_dir();
    Ok(vec![
        (
            ItemKind::Html,
            Arc::new(SaveProcessor::new(ItemKind::Html, layout, site_dir.clone())) as Arc<dyn PostProcessor>,
        ),
        (
            ItemKind::Image,
            Arc::new(SaveProcessor::new(ItemKind::Image, layout, site_dir)),
        ),
    ])
}

/// Routes items through the processors of their state and kind
#[derive(Default)]
pub struct Pipeline {
    processors: HashMap<String, HashMap<ItemKind, Vec<Arc<dyn PostProcessor>>>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the pipeline described by the `[processors]` configuration
    pub fn from_config(
        config: &ProcessorsConfig,
        registry: &ProcessorRegistry,
        context: &ProcessorContext,
    ) -> Result<Self, PipelineError> {
        let mut pipeline = Self::new();

        for (state, assignments) in config {
            for assignment in assignments {
                let factory =
                    registry
                        .get(&assignment.class)
                        .ok_or_else(|| PipelineError::UnknownProcessor {
                            state: state.clone(),
                            class: assignment.class.clone(),
                        })?;

                for (kind, processor) in factory(&assignment.method, context)? {
                    pipeline.register(state, kind, processor);
                }
            }
        }

        Ok(pipeline)
    }

    /// Appends a processor for items of `kind` coming from `state`
    pub fn register(&mut self, state: &str, kind: ItemKind, processor: Arc<dyn PostProcessor>) {
        self.processors
            .entry(state.to_string())
            .or_default()
            .entry(kind)
            .or_default()
            .push(processor);
    }

    /// Processors for a state and kind, in registration order
    pub fn processors_for(&self, state: &str, kind: ItemKind) -> &[Arc<dyn PostProcessor>] {
        self.processors
            .get(state)
            .and_then(|kinds| kinds.get(&kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of registered processors
    pub fn len(&self) -> usize {
        self.processors
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs the item through its processors, never failing
    pub fn process(&self, item: Item) -> Item {
        let mut item = item;

        for processor in self.processors_for(item.state(), item.kind()) {
            match processor.process(&item) {
                Ok(result) => {
                    record_success("pipeline", item.url(), &format!("Processor '{}' done", processor.name()));
                    if let Some(replacement) = result {
                        item = replacement;
                    }
                }
                Err(e) => {
                    warn!(
                        processor = processor.name(),
                        item_id = item.id(),
                        url = item.url(),
                        "Processor failed: {}",
                        e
                    );
                    record_error("pipeline", item.url(), &format!("Processor '{}' failed", processor.name()), &e);
                }
            }
        }

        item
    }

    /// True when the item has processors and every one of them reports it done
    pub fn already_processed(&self, item: &Item) -> bool {
        let processors = self.processors_for(item.state(), item.kind());
        let done = !processors.is_empty() && processors.iter().all(|p| p.already_processed(item));
        if done {
            debug!(item_id = item.id(), "Item already processed");
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use crate::item::ItemBase;
    use parking_lot::Mutex;
    use serde_json::Map;
    use tempfile::TempDir;

    /// Records the order it ran in and optionally fails or rewrites the item
    struct Recorder {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
        fail_for: Option<String>,
        rename_to: Option<String>,
    }

    impl Recorder {
        fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.to_string(),
                log: Arc::clone(log),
                fail: false,
                fail_for: None,
                rename_to: None,
            }
        }
    }

    impl PostProcessor for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn process(&self, item: &Item) -> ProcessResult<Option<Item>> {
            self.log.lock().push(format!("{}:{}", self.name, item.id()));
            if self.fail || self.fail_for.as_deref() == Some(item.id()) {
                return Err(ProcessError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            Ok(self.rename_to.as_ref().map(|id| {
                let mut renamed = item.clone();
                renamed.base_mut().id = id.clone();
                renamed
            }))
        }

        fn already_processed(&self, _item: &Item) -> bool {
            true
        }
    }

    fn item(state: &str) -> Item {
        item_with_id(state, "a")
    }

    fn item_with_id(state: &str, id: &str) -> Item {
        Item::Generic(ItemBase {
            id: id.to_string(),
            state: state.to_string(),
            url: format!("https://example.com/{}", id),
            content: b"body".to_vec(),
            metadata: Map::new(),
        })
    }

    #[test]
    fn test_no_processors_returns_item_unchanged() {
        let pipeline = Pipeline::new();
        let original = item("start");
        assert_eq!(pipeline.process(original.clone()), original);
        assert!(!pipeline.already_processed(&original));
    }

    #[test]
    fn test_processors_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.register("start", ItemKind::Generic, Arc::new(Recorder::new("first", &log)));
        pipeline.register("start", ItemKind::Generic, Arc::new(Recorder::new("second", &log)));
        pipeline.register("other", ItemKind::Generic, Arc::new(Recorder::new("elsewhere", &log)));

        pipeline.process(item("start"));
        assert_eq!(*log.lock(), vec!["first:a", "second:a"]);
    }

    #[test]
    fn test_failing_processor_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = Recorder::new("failing", &log);
        failing.fail = true;

        let mut pipeline = Pipeline::new();
        pipeline.register("start", ItemKind::Generic, Arc::new(failing));
        pipeline.register("start", ItemKind::Generic, Arc::new(Recorder::new("next", &log)));

        let original = item("start");
        let processed = pipeline.process(original.clone());

        assert_eq!(processed, original);
        assert_eq!(*log.lock(), vec!["failing:a", "next:a"]);
    }

    #[test]
    fn test_failure_on_one_item_leaves_the_next_alone() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut flaky = Recorder::new("flaky", &log);
        flaky.fail_for = Some("a".to_string());
        let mut renamer = Recorder::new("renamer", &log);
        renamer.rename_to = Some("done".to_string());

        let mut pipeline = Pipeline::new();
        pipeline.register("start", ItemKind::Generic, Arc::new(flaky));
        pipeline.register("start", ItemKind::Generic, Arc::new(renamer));

        let first = pipeline.process(item_with_id("start", "a"));
        let second = pipeline.process(item_with_id("start", "b"));

        assert_eq!(first.id(), "done");
        assert_eq!(second.id(), "done");
        assert_eq!(second.url(), "https://example.com/b");
        assert_eq!(*log.lock(), vec!["flaky:a", "renamer:a", "flaky:b", "renamer:b"]);
    }

    #[test]
    fn test_replacement_flows_to_next_processor() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut renamer = Recorder::new("renamer", &log);
        renamer.rename_to = Some("b".to_string());

        let mut pipeline = Pipeline::new();
        pipeline.register("start", ItemKind::Generic, Arc::new(renamer));
        pipeline.register("start", ItemKind::Generic, Arc::new(Recorder::new("next", &log)));

        let processed = pipeline.process(item("start"));
        assert_eq!(processed.id(), "b");
        assert_eq!(*log.lock(), vec!["renamer:a", "next:b"]);
    }

    #[test]
    fn test_already_processed_requires_processors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.register("start", ItemKind::Generic, Arc::new(Recorder::new("r", &log)));

        assert!(pipeline.already_processed(&item("start")));
        assert!(!pipeline.already_processed(&item("other")));
    }

    #[test]
    fn test_from_config_save_class() {
        let dir = TempDir::new().unwrap();
        let context = ProcessorContext {
            site: "books".to_string(),
            session_dir: dir.path().to_path_buf(),
        };
        let mut config = ProcessorsConfig::new();
        config.insert(
            "book".to_string(),
            vec![ProcessorConfig {
                class: "save".to_string(),
                method: "default".to_string(),
            }],
        );

        let pipeline = Pipeline::from_config(&config, &ProcessorRegistry::default(), &context).unwrap();
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.processors_for("book", ItemKind::Html).len(), 1);
        assert_eq!(pipeline.processors_for("book", ItemKind::Image).len(), 1);
        assert!(pipeline.processors_for("book", ItemKind::Generic).is_empty());
    }

    #[test]
    fn test_from_config_unknown_class() {
        let context = ProcessorContext {
            site: "books".to_string(),
            session_dir: "/tmp".into(),
        };
        let mut config = ProcessorsConfig::new();
        config.insert(
            "book".to_string(),
            vec![ProcessorConfig {
                class: "upload".to_string(),
                method: "default".to_string(),
            }],
        );

        let result = Pipeline::from_config(&config, &ProcessorRegistry::default(), &context);
        assert!(matches!(result, Err(PipelineError::UnknownProcessor { class, .. }) if class == "upload"));
    }

    #[test]
    fn test_from_config_unknown_layout() {
        let context = ProcessorContext {
            site: "books".to_string(),
            session_dir: "/tmp".into(),
        };
        let mut config = ProcessorsConfig::new();
        config.insert(
            "book".to_string(),
            vec![ProcessorConfig {
                class: "save".to_string(),
                method: "by_date".to_string(),
            }],
        );

        let result = Pipeline::from_config(&config, &ProcessorRegistry::default(), &context);
        assert!(matches!(result, Err(PipelineError::UnknownSaveLayout(_))));
    }
}
