// src/exec/shell.rs

//! Spawning a single command line under `sh -c`.

use std::path::Path;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::errors::{Result, ScriptError};
use crate::exec::env::apply_env;
use crate::types::EnvMap;

/// Build `sh -c "<command>"` with the environment policy applied.
///
/// stdin is closed, stdout/stderr are piped. With `detached` the child
/// becomes leader of a new process group (POSIX only), which is what lets
/// the terminator signal the whole tree. Elsewhere `detached` is ignored.
pub fn shell_command(
    command: &str,
    cwd: &Path,
    extra_env: Option<&EnvMap>,
    detached: bool,
) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    apply_env(&mut cmd, extra_env);

    #[cfg(unix)]
    if detached {
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    let _ = detached;

    cmd
}

/// Spawn `command`; the OS error is kept in [`ScriptError::Spawn`].
pub fn spawn_shell(
    command: &str,
    cwd: &Path,
    extra_env: Option<&EnvMap>,
    detached: bool,
) -> Result<Child> {
    let child = shell_command(command, cwd, extra_env, detached)
        .spawn()
        .map_err(|source| ScriptError::Spawn {
            command: command.to_string(),
            source,
        })?;

    debug!(command, pid = ?child.id(), detached, "spawned shell command");
    Ok(child)
}
