//! Pending-request backlog.
//!
//! A deque with two insertion points: new arrivals go to the back, retried
//! requests go to the front.  Only two priority classes ever exist, so a
//! general priority queue would buy nothing.
//!
//! The queue knows nothing about retry budgets or request kinds; admission
//! decisions that involve the in-flight request are made by
//! [`DispatchCore`](super::machine::DispatchCore).

use std::collections::VecDeque;

use super::request::Request;

/// Bounded FIFO of pending requests.
#[derive(Debug)]
pub struct RequestQueue {
    items: VecDeque<Request>,
    capacity: usize,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append a new arrival.  Hands the request back if the queue is full.
    pub fn push_back(&mut self, request: Request) -> Result<(), Request> {
        if self.items.len() >= self.capacity {
            return Err(request);
        }
        self.items.push_back(request);
        Ok(())
    }

    /// Re-insert a retried request ahead of everything else.
    ///
    /// Never refused: the request was already counted against the backlog
    /// while it was in flight.
    pub fn push_front(&mut self, request: Request) {
        self.items.push_front(request);
    }

    pub fn pop_front(&mut self) -> Option<Request> {
        self.items.pop_front()
    }

    /// Remove everything, front first.
    pub fn drain(&mut self) -> impl Iterator<Item = Request> + '_ {
        self.items.drain(..)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids in dispatch order (front first).
    pub fn ids(&self) -> impl Iterator<Item = super::request::RequestId> + '_ {
        self.items.iter().map(Request::id)
    }
}
