// src/config/validate.rs

use crate::config::model::{ManagerConfig, RawConfigFile};
use crate::errors::{Result, ScriptError};

impl TryFrom<RawConfigFile> for ManagerConfig {
    type Error = crate::errors::ScriptError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ManagerConfig::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_capture(cfg)?;
    validate_relay(cfg)?;
    validate_env(cfg)?;
    Ok(())
}

fn validate_capture(cfg: &RawConfigFile) -> Result<()> {
    if cfg.capture.timeout_ms == 0 {
        return Err(ScriptError::ConfigError(
            "[capture].timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_relay(cfg: &RawConfigFile) -> Result<()> {
    // tokio's broadcast channel panics on a zero capacity.
    if cfg.relay.bus_capacity == 0 {
        return Err(ScriptError::ConfigError(
            "[relay].bus_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_env(cfg: &RawConfigFile) -> Result<()> {
    for (name, value) in cfg.env.iter() {
        if name.is_empty() {
            return Err(ScriptError::ConfigError(
                "[env] contains an empty variable name".to_string(),
            ));
        }
        if name.contains('=') || name.contains('\0') {
            return Err(ScriptError::ConfigError(format!(
                "[env] variable name '{}' must not contain '=' or NUL",
                name
            )));
        }
        if value.contains('\0') {
            return Err(ScriptError::ConfigError(format!(
                "[env] value of '{}' must not contain NUL",
                name
            )));
        }
    }
    Ok(())
}
