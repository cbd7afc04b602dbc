// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! None of the runner operations on [`crate::ScriptManager`] return these
//! errors directly: they are converted into typed outcomes at the point of
//! origin. The `Display` strings of [`ScriptError::NonZeroExit`] and
//! [`ScriptError::Timeout`] are the messages callers see in
//! `RunOutcome::error` / `CaptureOutcome::error`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Failed to spawn \"{command}\": {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command \"{command}\" exited with code {code}")]
    NonZeroExit { command: String, code: i32 },

    #[error("Command \"{command}\" was terminated by signal {signal}")]
    Signaled { command: String, signal: i32 },

    #[error("Command \"{command}\" timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("Failed to signal process {pid}: {reason}")]
    Signal { pid: u32, reason: String },
}

pub type Result<T> = std::result::Result<T, ScriptError>;
