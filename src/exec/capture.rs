// src/exec/capture.rs

//! Capture-and-wait runner for non-interactive hooks.
//!
//! Commands run one after another without a key and without events; their
//! stdout+stderr is buffered. Each command gets its own deadline. On
//! timeout it receives SIGTERM, then SIGKILL after the capture kill grace.

use std::path::Path;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::errors::ScriptError;
use crate::exec::pipe::{DRAIN_GRACE, spawn_pipe_reader};
use crate::exec::shell::spawn_shell;
use crate::manager::ScriptManager;
use crate::parse::parse_commands;
use crate::process::{KillSignal, signal_child};
use crate::types::{CaptureOutcome, ExitInfo};

/// One command's captured output and how it ended.
struct Captured {
    output: String,
    result: Result<(), ScriptError>,
}

impl ScriptManager {
    /// Run parsed commands in order, buffering their output.
    ///
    /// `timeout_per_command` defaults to the configured capture timeout
    /// (30s unless overridden). Stops at the first non-zero exit or timeout;
    /// the returned `output` then includes that command's partial output.
    pub async fn run_and_wait<S: AsRef<str>>(
        &self,
        scripts: &[S],
        cwd: &Path,
        timeout_per_command: Option<Duration>,
    ) -> CaptureOutcome {
        let limit = timeout_per_command.unwrap_or(self.inner.capture.default_timeout);
        let kill_grace = self.inner.capture.kill_grace;
        let commands = parse_commands(scripts);
        let mut output = String::new();

        for command in &commands {
            let captured = capture_one(command, cwd, limit, kill_grace).await;
            output.push_str(&captured.output);

            if let Err(err) = captured.result {
                info!(command = %command, error = %err, "capture run halted");
                return CaptureOutcome::failed(output, err);
            }
        }

        CaptureOutcome::ok(output)
    }
}

async fn capture_one(command: &str, cwd: &Path, limit: Duration, kill_grace: Duration) -> Captured {
    let mut child = match spawn_shell(command, cwd, None, false) {
        Ok(child) => child,
        Err(err) => {
            warn!(error = %err, "spawn failed; reporting exit code 1");
            return Captured {
                output: String::new(),
                result: Err(ExitInfo::failure().to_error(command)),
            };
        }
    };

    let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<String>();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_pipe_reader(stdout, chunk_tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_pipe_reader(stderr, chunk_tx));
    }

    let result = match timeout(limit, child.wait()).await {
        Ok(Ok(status)) => {
            let exit = ExitInfo::from_status(status);
            if exit.success() {
                Ok(())
            } else {
                Err(exit.to_error(command))
            }
        }
        Ok(Err(e)) => {
            warn!(command, error = %e, "failed waiting for child; treating as exit code 1");
            Err(ExitInfo::failure().to_error(command))
        }
        Err(_) => {
            stop_after_timeout(&mut child, command, kill_grace).await;
            Err(ScriptError::Timeout {
                command: command.to_string(),
                timeout_ms: limit.as_millis() as u64,
            })
        }
    };

    let mut output = String::new();
    let drained = timeout(DRAIN_GRACE, async {
        while let Some(chunk) = chunk_rx.recv().await {
            output.push_str(&chunk);
        }
    })
    .await;

    if drained.is_err() {
        debug!(command, "output pipes still open after exit; abandoning them");
        for reader in &readers {
            reader.abort();
        }
        while let Ok(chunk) = chunk_rx.try_recv() {
            output.push_str(&chunk);
        }
    }

    Captured { output, result }
}

async fn stop_after_timeout(child: &mut Child, command: &str, kill_grace: Duration) {
    info!(command, "command timed out; sending SIGTERM");
    if let Err(e) = signal_child(child, KillSignal::Terminate) {
        debug!(command, error = %e, "SIGTERM failed");
    }

    if timeout(kill_grace, child.wait()).await.is_ok() {
        return;
    }

    warn!(command, "command ignored SIGTERM; sending SIGKILL");
    if let Err(e) = signal_child(child, KillSignal::Kill) {
        debug!(command, error = %e, "SIGKILL failed");
    }
    let _ = child.wait().await;
}
