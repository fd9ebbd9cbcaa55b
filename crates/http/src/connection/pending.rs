use std::collections::VecDeque;

use bytes::Bytes;
use http::Request;

/// Completed requests waiting for their turn, oldest first.
///
/// Pipelined requests are answered in the order they were completed, so the
/// queue is strictly FIFO and never reordered.
#[derive(Debug, Default)]
pub struct PendingRequests {
    queue: VecDeque<Request<Bytes>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: Request<Bytes>) {
        self.queue.push_back(request);
    }

    pub fn pop(&mut self) -> Option<Request<Bytes>> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops every queued request; used on teardown.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
