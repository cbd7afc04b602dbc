#![allow(dead_code)]

use scriptrun::config::{ManagerConfig, RawConfigFile};

/// Builder for `ManagerConfig` to simplify test setup.
///
/// Starts from the production defaults; tests usually shrink the
/// escalation windows so kill paths finish quickly.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    /// Short escalation windows suitable for tests.
    pub fn fast() -> Self {
        Self::new().term_grace_ms(200).kill_grace_ms(1000).capture_kill_grace_ms(200)
    }

    pub fn term_grace_ms(mut self, ms: u64) -> Self {
        self.config.escalation.term_grace_ms = ms;
        self
    }

    pub fn kill_grace_ms(mut self, ms: u64) -> Self {
        self.config.escalation.kill_grace_ms = ms;
        self
    }

    pub fn capture_timeout_ms(mut self, ms: u64) -> Self {
        self.config.capture.timeout_ms = ms;
        self
    }

    pub fn capture_kill_grace_ms(mut self, ms: u64) -> Self {
        self.config.capture.kill_grace_ms = ms;
        self
    }

    pub fn bus_capacity(mut self, capacity: usize) -> Self {
        self.config.relay.bus_capacity = capacity;
        self
    }

    pub fn env(mut self, name: &str, value: &str) -> Self {
        self.config.env.insert(name.to_string(), value.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ManagerConfig {
        ManagerConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
