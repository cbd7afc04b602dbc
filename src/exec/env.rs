// src/exec/env.rs

//! Environment policy for spawned shell commands.
//!
//! Layers, lowest priority first:
//! 1. the host process environment (inherited),
//! 2. [`COLOR_OVERLAY`], so colourised CLI output survives being piped,
//! 3. the caller's `extraEnv`, which may override anything below it.

use tokio::process::Command;

use crate::types::EnvMap;

/// Variables forcing colour output in common CLI tooling.
pub const COLOR_OVERLAY: [(&str, &str); 3] = [
    ("FORCE_COLOR", "1"),
    ("TERM", "xterm-256color"),
    ("COLORTERM", "truecolor"),
];

/// Compute the fully merged environment from an explicit base.
///
/// [`apply_env`] relies on `Command` inheriting the host environment and only
/// sets layers 2 and 3; this function gives the same result as a value.
pub fn layered_env<I, K, V>(inherited: I, extra: Option<&EnvMap>) -> EnvMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut env: EnvMap = inherited
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();

    for (name, value) in COLOR_OVERLAY {
        env.insert(name.to_string(), value.to_string());
    }

    if let Some(extra) = extra {
        env.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    env
}

/// Apply the colour overlay and `extra` on top of the inherited environment.
pub fn apply_env(cmd: &mut Command, extra: Option<&EnvMap>) {
    cmd.envs(COLOR_OVERLAY);
    if let Some(extra) = extra {
        cmd.envs(extra);
    }
}
