//! Traversal graph: state → ordered edges to next states
//!
//! The graph is built once from the `[traversal]` configuration. Every
//! callback of every node description becomes an edge from the declaring
//! state, and each edge owns freshly built instances of the node's
//! extractors. Node descriptions sharing a callback have their extractor
//! lists concatenated in configuration order.

use crate::config::TraversalConfig;
use crate::extract::{Extractor, ExtractorRegistry};
use crate::GraphError;
use std::collections::BTreeMap;
use tracing::debug;

/// An edge to a next state and the extractors that find its URLs
#[derive(Debug)]
pub struct Edge {
    pub target: String,
    pub extractors: Vec<Box<dyn Extractor>>,
}

/// Validated mapping from state to outgoing edges
#[derive(Debug, Default)]
pub struct TraversalGraph {
    states: BTreeMap<String, Vec<Edge>>,
}

impl TraversalGraph {
    /// Builds the graph with the default extractor classes
    pub fn from_config(config: &TraversalConfig) -> Result<Self, GraphError> {
        Self::build(config, &ExtractorRegistry::default())
    }

    /// Validates every callback target, then builds every extractor
    ///
    /// # Errors
    ///
    /// * `InvalidGraph` - a callback names a state that is not declared
    /// * `UnknownExtractorClass` - an extractor class is not registered
    /// * `InvalidParams` - an extractor rejected its parameters
    pub fn build(config: &TraversalConfig, registry: &ExtractorRegistry) -> Result<Self, GraphError> {
        for (state, nodes) in config {
            for callback in nodes.iter().flat_map(|node| &node.callbacks) {
                if !config.contains_key(callback) {
                    return Err(GraphError::InvalidGraph {
                        state: state.clone(),
                        callback: callback.clone(),
                    });
                }
            }
        }

        let mut states = BTreeMap::new();
        for (state, nodes) in config {
            let mut edges: Vec<Edge> = Vec::new();

            for node in nodes {
                // Nodes without callbacks never get an edge, but their
                // extractors must still name a known class with valid params
                if node.callbacks.is_empty() {
                    for extractor in &node.extractors {
                        registry.build(extractor)?;
                    }
                }

                for callback in &node.callbacks {
                    let built = node
                        .extractors
                        .iter()
                        .map(|extractor| registry.build(extractor))
                        .collect::<Result<Vec<_>, _>>()?;

                    match edges.iter_mut().find(|edge| &edge.target == callback) {
                        Some(edge) => edge.extractors.extend(built),
                        None => edges.push(Edge {
                            target: callback.clone(),
                            extractors: built,
                        }),
                    }
                }
            }

            debug!("State '{}' has {} outgoing edge(s)", state, edges.len());
            states.insert(state.clone(), edges);
        }

        Ok(Self { states })
    }

    /// Outgoing edges of a state; empty for an unknown state
    pub fn get(&self, state: &str) -> &[Edge] {
        self.states.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, state: &str) -> bool {
        self.states.contains_key(state)
    }

    /// Declared state names, sorted
    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    pub fn edge_count(&self) -> usize {
        self.states.values().map(Vec::len).sum()
    }

    pub fn extractor_count(&self) -> usize {
        self.states
            .values()
            .flatten()
            .map(|edge| edge.extractors.len())
            .sum()
    }
}
