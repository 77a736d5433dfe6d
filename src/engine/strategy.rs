use crate::document::{FetchRequest, FetchedDocument, META_SOURCE_PAGE};
use crate::events::{record_error, record_success};
use crate::graph::TraversalGraph;
use crate::item::{Item, ItemBuilder};
use crate::url::dedup_key;
use crate::ExtractError;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the strategy produces for one document
#[derive(Debug)]
pub enum Output {
    Item(Item),
    Request(FetchRequest),
}

impl Output {
    pub fn as_request(&self) -> Option<&FetchRequest> {
        match self {
            Output::Request(request) => Some(request),
            Output::Item(_) => None,
        }
    }

    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Output::Item(item) => Some(item),
            Output::Request(_) => None,
        }
    }
}

/// State machine turning a fetched document into an item and follow-up requests
///
/// The seen set is global to the run: a URL is enqueued at most once, whatever
/// state it is reached from. Seen keys have query and fragment removed.
pub struct CrawlStrategy {
    graph: Arc<TraversalGraph>,
    items: ItemBuilder,
    seen: Mutex<HashSet<String>>,
}

impl CrawlStrategy {
    pub fn new(graph: Arc<TraversalGraph>) -> Self {
        Self::with_item_builder(graph, ItemBuilder::default())
    }

    pub fn with_item_builder(graph: Arc<TraversalGraph>, items: ItemBuilder) -> Self {
        Self {
            graph,
            items,
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub fn graph(&self) -> &TraversalGraph {
        &self.graph
    }

    /// Number of distinct URLs enqueued so far
    pub fn seen_count(&self) -> usize {
        self.seen.lock().len()
    }

    /// Requests for the configured start URLs, recorded as seen
    pub fn start_requests(&self, start_urls: &BTreeMap<String, String>) -> Vec<FetchRequest> {
        let mut seen = self.seen.lock();
        start_urls
            .iter()
            .filter(|(_, url)| seen.insert(dedup_key(url)))
            .map(|(state, url)| FetchRequest::new(url.clone(), state.clone()))
            .collect()
    }

    /// Processes one document
    ///
    /// Returns the item (when one could be built) followed by one request per
    /// newly seen URL, in edge order then extraction order.
    ///
    /// # Errors
    ///
    /// An extractor failure fails this document only; no URL of the document
    /// is recorded as seen in that case.
    pub fn on_document(&self, document: &FetchedDocument) -> Result<Vec<Output>, ExtractError> {
        let Some(state) = document.state.as_deref() else {
            warn!(url = %document.url, "Document has no origin state, skipping");
            return Ok(Vec::new());
        };
        debug!(url = %document.url, state, "Processing document");

        let mut outputs = Vec::new();
        match self.items.from_document(document, state) {
            Ok(item) => outputs.push(Output::Item(item)),
            Err(e) => {
                warn!(url = %document.url, state, "Item creation failed: {}", e);
                record_error("strategy", document.url.as_str(), "Item creation failed", &e);
            }
        }

        let mut found = Vec::new();
        for edge in self.graph.get(state) {
            for extractor in &edge.extractors {
                let urls = extractor.extract(document).map_err(|e| {
                    record_error("strategy", document.url.as_str(), "Extraction failed", &e);
                    e
                })?;
                found.extend(urls.into_iter().map(|url| (edge.target.as_str(), url)));
            }
        }

        let source_page = document.url.to_string();
        let mut seen = self.seen.lock();
        for (target, url) in found {
            if !seen.insert(dedup_key(&url)) {
                debug!(url = %url, "Already seen, skipping");
                continue;
            }
            outputs.push(Output::Request(
                FetchRequest::new(url, target).with_meta(META_SOURCE_PAGE, source_page.as_str()),
            ));
        }
        drop(seen);

        let requests = outputs.iter().filter(|o| o.as_request().is_some()).count();
        debug!(url = %document.url, requests, "Links extracted");
        record_success(
            "strategy",
            document.url.as_str(),
            &format!("Document handled in state '{}', {} new request(s)", state, requests),
        );
        Ok(outputs)
    }
}
