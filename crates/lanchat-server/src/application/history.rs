//! Ordered log of every event the relay has published.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use lanchat_core::ChatEvent;

/// Append-only event log, optionally capped.
///
/// With no capacity the log grows for the lifetime of the server.  With a
/// capacity, pushing into a full log drops the oldest event first.
#[derive(Debug, Default)]
pub struct History {
    events: VecDeque<ChatEvent>,
    capacity: Option<NonZeroUsize>,
    evicted: u64,
}

impl History {
    pub fn new(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            events: VecDeque::new(),
            capacity,
            evicted: 0,
        }
    }

    /// Appends `event`, returning how many old events were dropped to make
    /// room for it.
    pub fn push(&mut self, event: ChatEvent) -> usize {
        let mut dropped = 0;
        if let Some(cap) = self.capacity {
            while self.events.len() >= cap.get() {
                self.events.pop_front();
                dropped += 1;
            }
        }
        self.evicted += dropped as u64;
        self.events.push_back(event);
        dropped
    }

    /// Copy of the retained events, oldest first.
    pub fn snapshot(&self) -> Vec<ChatEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events dropped to honour the capacity since startup.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }
}
