//! Frontier queue of requests waiting for dispatch
//!
//! Requests are dispatched in discovery order. Retries go to the front so a
//! request interrupted by a proxy failure is not starved behind new work.

use crate::document::FetchRequest;
use std::collections::VecDeque;

/// FIFO queue of pending fetch requests
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FetchRequest>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a newly discovered request
    pub fn push(&mut self, request: FetchRequest) {
        self.queue.push_back(request);
    }

    /// Queues a request ahead of everything else
    pub fn push_front(&mut self, request: FetchRequest) {
        self.queue.push_front(request);
    }

    pub fn pop(&mut self) -> Option<FetchRequest> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Extend<FetchRequest> for Frontier {
    fn extend<I: IntoIterator<Item = FetchRequest>>(&mut self, iter: I) {
        self.queue.extend(iter);
    }
}
