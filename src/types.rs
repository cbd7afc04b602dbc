// src/types.rs

//! Shared value types: execution keys, lifecycle events and run outcomes.

use std::collections::BTreeMap;
use std::fmt;
use std::process::ExitStatus;

use serde::Serialize;

use crate::errors::ScriptError;

/// Opaque identifier of a logical execution slot (e.g. "setup for checkout X").
///
/// At most one live managed process exists per key at any time.
pub type ExecutionKey = String;

/// Caller-supplied environment overlay (`extraEnv`).
pub type EnvMap = BTreeMap<String, String>;

/// Lifecycle event streamed to subscribers of an execution key.
///
/// Serialized as an internally tagged object, e.g.
/// `{"type":"error","command":"exit 1","exitCode":1}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ScriptEvent {
    CommandStart {
        command: String,
    },
    Output {
        data: String,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        command: Option<String>,
        #[serde(rename = "exitCode", skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },
    Done,
}

impl ScriptEvent {
    /// `done` and `error` end an event stream for a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScriptEvent::Done | ScriptEvent::Error { .. })
    }
}

/// Envelope used by push channels: an event plus the key it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyedEvent {
    pub key: ExecutionKey,
    #[serde(flatten)]
    pub event: ScriptEvent,
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal number (POSIX only).
    pub signal: Option<i32>,
}

impl ExitInfo {
    /// Spawn failures and internal wait errors are reported as exit code 1.
    pub fn failure() -> Self {
        Self {
            code: Some(1),
            signal: None,
        }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Caller-visible error for a failed command.
    pub fn to_error(&self, command: &str) -> ScriptError {
        match (self.code, self.signal) {
            (Some(code), _) => ScriptError::NonZeroExit {
                command: command.to_string(),
                code,
            },
            (None, Some(signal)) => ScriptError::Signaled {
                command: command.to_string(),
                signal,
            },
            (None, None) => ScriptError::NonZeroExit {
                command: command.to_string(),
                code: -1,
            },
        }
    }
}

/// Result of the sequential runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Result of the capture-and-wait runner.
///
/// `output` holds the captured stdout+stderr of every command that ran, up
/// to and including the first failing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureOutcome {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptureOutcome {
    pub fn ok(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn failed(output: String, error: impl fmt::Display) -> Self {
        Self {
            success: false,
            output,
            error: Some(error.to_string()),
        }
    }
}
