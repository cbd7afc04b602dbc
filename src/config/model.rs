// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::types::EnvMap;

/// Configuration as read from a TOML file.
///
/// ```toml
/// [escalation]
/// term_grace_ms = 800
/// kill_grace_ms = 2500
///
/// [capture]
/// timeout_ms = 30000
/// kill_grace_ms = 500
///
/// [relay]
/// bus_capacity = 256
///
/// [env]
/// PORT = "3000"
/// ```
///
/// All sections are optional and have defaults. Use
/// [`ManagerConfig::try_from`] (or `load_and_validate`) to get a checked
/// configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub escalation: EscalationSection,

    #[serde(default)]
    pub capture: CaptureSection,

    #[serde(default)]
    pub relay: RelaySection,

    /// Default `extraEnv` the CLI passes on every run.
    #[serde(default)]
    pub env: EnvMap,
}

/// `[escalation]` section: windows of the kill protocol.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EscalationSection {
    /// How long to wait for exit after SIGTERM before sending SIGKILL.
    #[serde(default = "default_term_grace_ms")]
    pub term_grace_ms: u64,

    /// How long to wait for exit after SIGKILL before evicting the entry anyway.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

fn default_term_grace_ms() -> u64 {
    800
}

fn default_kill_grace_ms() -> u64 {
    2500
}

impl Default for EscalationSection {
    fn default() -> Self {
        Self {
            term_grace_ms: default_term_grace_ms(),
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

/// `[capture]` section: capture-and-wait runner.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CaptureSection {
    /// Per-command timeout used when the caller does not pass one.
    #[serde(default = "default_capture_timeout_ms")]
    pub timeout_ms: u64,

    /// Grace period between SIGTERM and SIGKILL once a command timed out.
    #[serde(default = "default_capture_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

fn default_capture_timeout_ms() -> u64 {
    30_000
}

fn default_capture_kill_grace_ms() -> u64 {
    500
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_capture_timeout_ms(),
            kill_grace_ms: default_capture_kill_grace_ms(),
        }
    }
}

/// `[relay]` section.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RelaySection {
    /// Buffer size of each event bus topic.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

fn default_bus_capacity() -> usize {
    256
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            bus_capacity: default_bus_capacity(),
        }
    }
}

/// Validated configuration handed to [`crate::ScriptManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub escalation: EscalationSection,
    pub capture: CaptureSection,
    pub relay: RelaySection,
    pub env: EnvMap,
}

impl ManagerConfig {
    /// Construct from already-validated sections; use `TryFrom<RawConfigFile>`
    /// everywhere else.
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            escalation: raw.escalation,
            capture: raw.capture,
            relay: raw.relay,
            env: raw.env,
        }
    }

    pub fn term_grace(&self) -> Duration {
        Duration::from_millis(self.escalation.term_grace_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.escalation.kill_grace_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture.timeout_ms)
    }

    pub fn capture_kill_grace(&self) -> Duration {
        Duration::from_millis(self.capture.kill_grace_ms)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new_unchecked(RawConfigFile::default())
    }
}
