// src/process/group.rs

//! Process-tree signalling, abstracted per platform family.
//!
//! - POSIX: the managed process is spawned as a process-group leader, so the
//!   whole tree is signalled with `killpg(pid, sig)` (equivalent to
//!   `kill(-pid, sig)`).
//! - Windows: `taskkill /pid <pid> /t`, plus `/f` when force-killing.
//!
//! The [`crate::process::Terminator`] only talks to the [`ProcessGroup`]
//! trait, so tests can substitute a recording implementation.

use std::fmt::Debug;
use std::sync::Arc;

use tokio::process::Child;
#[cfg(windows)]
use tracing::debug;

use crate::errors::{Result, ScriptError};

/// Signal sent during kill escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSignal {
    /// Graceful: SIGTERM / `taskkill /t`.
    Terminate,
    /// Forceful: SIGKILL / `taskkill /t /f`.
    Kill,
}

/// Delivers a signal to a process and all of its descendants.
pub trait ProcessGroup: Send + Sync + Debug {
    fn signal_tree(&self, pid: u32, signal: KillSignal) -> Result<()>;
}

/// The implementation for the current platform.
pub fn platform_group() -> Arc<dyn ProcessGroup> {
    #[cfg(unix)]
    {
        Arc::new(PosixGroup)
    }
    #[cfg(windows)]
    {
        Arc::new(TaskkillGroup)
    }
}

/// `killpg`-based tree signalling.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixGroup;

#[cfg(unix)]
impl ProcessGroup for PosixGroup {
    fn signal_tree(&self, pid: u32, signal: KillSignal) -> Result<()> {
        use nix::sys::signal::killpg;

        let pgid = to_nix_pid(pid)?;
        killpg(pgid, to_nix_signal(signal)).map_err(|errno| ScriptError::Signal {
            pid,
            reason: errno.desc().to_string(),
        })
    }
}

/// `taskkill`-based tree signalling.
///
/// `taskkill` is spawned on the runtime and reaped in the background, so a
/// slow `taskkill` never stalls the caller. Only a failure to start it is
/// reported; a non-zero `taskkill` exit is logged and the terminator's
/// escalation carries on regardless.
#[cfg(windows)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskkillGroup;

#[cfg(windows)]
impl ProcessGroup for TaskkillGroup {
    fn signal_tree(&self, pid: u32, signal: KillSignal) -> Result<()> {
        use std::process::Stdio;

        let mut cmd = tokio::process::Command::new("taskkill");
        cmd.arg("/pid")
            .arg(pid.to_string())
            .arg("/t")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if signal == KillSignal::Kill {
            cmd.arg("/f");
        }

        let child = cmd.spawn().map_err(|e| ScriptError::Signal {
            pid,
            reason: format!("failed to start taskkill: {e}"),
        })?;

        tokio::spawn(async move {
            match child.wait_with_output().await {
                Ok(output) if !output.status.success() => debug!(
                    pid,
                    ?signal,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "taskkill reported failure"
                ),
                Ok(_) => {}
                Err(e) => debug!(pid, ?signal, error = %e, "waiting for taskkill failed"),
            }
        });
        Ok(())
    }
}

/// Signal only the given child, not its tree.
///
/// This is the fallback when tree signalling is unavailable or failed. On
/// non-POSIX platforms both signals map to a hard kill of the handle.
pub fn signal_child(child: &mut Child, signal: KillSignal) -> Result<()> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            use nix::sys::signal::kill;

            return kill(to_nix_pid(pid)?, to_nix_signal(signal)).map_err(|errno| {
                ScriptError::Signal {
                    pid,
                    reason: errno.desc().to_string(),
                }
            });
        }
    }

    let _ = signal;
    child.start_kill()?;
    Ok(())
}

#[cfg(unix)]
fn to_nix_pid(pid: u32) -> Result<nix::unistd::Pid> {
    let raw = i32::try_from(pid).map_err(|_| ScriptError::Signal {
        pid,
        reason: "pid out of range".to_string(),
    })?;
    Ok(nix::unistd::Pid::from_raw(raw))
}

#[cfg(unix)]
fn to_nix_signal(signal: KillSignal) -> nix::sys::signal::Signal {
    use nix::sys::signal::Signal;

    match signal {
        KillSignal::Terminate => Signal::SIGTERM,
        KillSignal::Kill => Signal::SIGKILL,
    }
}
