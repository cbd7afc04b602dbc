// src/relay/console.rs

//! Renders events on the terminal for the CLI.
//!
//! Text mode writes script output verbatim to stdout and command banners /
//! failures to stderr. JSON mode writes one [`KeyedEvent`] per line to stdout.

use std::io::{self, Write};

use tracing::warn;

use super::EventSink;
use crate::types::{KeyedEvent, ScriptEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    format: ConsoleFormat,
}

impl ConsoleSink {
    pub fn new(format: ConsoleFormat) -> Self {
        Self { format }
    }

    fn write_text(&self, event: &ScriptEvent) -> io::Result<()> {
        match event {
            ScriptEvent::CommandStart { command } => {
                writeln!(io::stderr().lock(), "$ {command}")
            }
            ScriptEvent::Output { data } => {
                let mut out = io::stdout().lock();
                out.write_all(data.as_bytes())?;
                out.flush()
            }
            ScriptEvent::Error { command, exit_code } => {
                let what = command.as_deref().unwrap_or("process");
                match exit_code {
                    Some(code) => writeln!(io::stderr().lock(), "! {what} exited with code {code}"),
                    None => writeln!(io::stderr().lock(), "! {what} was terminated"),
                }
            }
            ScriptEvent::Done => Ok(()),
        }
    }

    fn write_json(&self, key: &str, event: &ScriptEvent) -> io::Result<()> {
        let keyed = KeyedEvent {
            key: key.to_string(),
            event: event.clone(),
        };
        let line = serde_json::to_string(&keyed).map_err(io::Error::other)?;
        writeln!(io::stdout().lock(), "{line}")
    }
}

impl EventSink for ConsoleSink {
    fn publish(&self, key: &str, event: &ScriptEvent) {
        let res = match self.format {
            ConsoleFormat::Text => self.write_text(event),
            ConsoleFormat::Json => self.write_json(key, event),
        };
        if let Err(err) = res {
            warn!(key, error = %err, "failed to write event to console");
        }
    }
}
