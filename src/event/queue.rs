//! Priority queue ordered by (timestamp, counter)

use super::{Event, OrderKey};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// An event whose ordering key has been assigned
#[derive(Debug, Clone)]
struct Queued {
    key: OrderKey,
    event: Event,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// Min-queue of validated events
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Queued>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an event; returns false if it has no ordering key
    pub fn push(&mut self, event: Event) -> bool {
        match event.key() {
            Some(key) => {
                self.heap.push(Reverse(Queued { key, event }));
                true
            }
            None => false,
        }
    }

    /// Remove the event with the smallest key
    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop().map(|Reverse(q)| q.event)
    }

    pub fn peek_key(&self) -> Option<OrderKey> {
        self.heap.peek().map(|Reverse(q)| q.key)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
