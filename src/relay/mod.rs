// src/relay/mod.rs

//! Delivery of [`ScriptEvent`]s to external subscribers.
//!
//! The core only publishes; collaborators implement [`EventSink`]. Delivery
//! is best-effort: a sink must never fail or panic because its consumer
//! went away.
//!
//! - [`bus`] is a pub/sub bus with one topic per execution key.
//! - [`channel`] pushes keyed events down a single channel (e.g. to a UI).
//! - [`console`] renders events for the CLI.
//!
//! Events for one key are published from one task at a time, so sinks see
//! them in chronological order without extra synchronisation.

use std::sync::Arc;

use crate::types::ScriptEvent;

pub mod bus;
pub mod channel;
pub mod console;

pub use bus::EventBus;
pub use channel::ChannelSink;
pub use console::{ConsoleFormat, ConsoleSink};

/// Receiver of lifecycle events, addressed by execution key.
pub trait EventSink: Send + Sync {
    fn publish(&self, key: &str, event: &ScriptEvent);
}

/// Fans every event out to a list of sinks, in order.
#[derive(Default)]
pub struct Relay {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for Relay {
    fn publish(&self, key: &str, event: &ScriptEvent) {
        for sink in &self.sinks {
            sink.publish(key, event);
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _key: &str, _event: &ScriptEvent) {}
}
