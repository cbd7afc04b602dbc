// src/relay/channel.rs

//! Push channel sink: every event, tagged with its key, down one mpsc.
//!
//! This is the shape a UI window wants: a single ordered stream it can
//! route by key. If the receiving side has been torn down, events are
//! dropped silently.

use tokio::sync::mpsc;
use tracing::debug;

use super::EventSink;
use crate::types::{KeyedEvent, ScriptEvent};

#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<KeyedEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<KeyedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, key: &str, event: &ScriptEvent) {
        let keyed = KeyedEvent {
            key: key.to_string(),
            event: event.clone(),
        };
        if self.tx.send(keyed).is_err() {
            debug!(key, "push channel closed; dropping event");
        }
    }
}
