// src/relay/bus.rs

//! Pub/sub event bus: topic = execution key.
//!
//! Each topic is a `tokio::sync::broadcast` channel created on first
//! subscription. Publishing to a topic nobody listens to is a no-op, and a
//! topic whose subscribers have all gone away is dropped on the next publish.
//! Slow subscribers lag (and are told so by `broadcast`) rather than
//! blocking the publisher.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::trace;

use super::EventSink;
use crate::types::{ExecutionKey, ScriptEvent};

#[derive(Debug)]
pub struct EventBus {
    topics: Mutex<HashMap<ExecutionKey, broadcast::Sender<ScriptEvent>>>,
    capacity: usize,
}

impl EventBus {
    /// `capacity` is the per-topic buffer; it must be at least 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to all future events published for `key`.
    pub fn subscribe(&self, key: &str) -> broadcast::Receiver<ScriptEvent> {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn topic_count(&self) -> usize {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for EventBus {
    fn publish(&self, key: &str, event: &ScriptEvent) {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = topics.get(key) else {
            return;
        };

        if tx.send(event.clone()).is_err() {
            trace!(key, "no subscribers left; dropping topic");
            topics.remove(key);
        }
    }
}
