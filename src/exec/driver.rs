// src/exec/driver.rs

//! Per-process driver task.
//!
//! The driver owns the `Child` for its whole life. It:
//! - forwards stdout/stderr chunks as `output` events, in arrival order,
//!   until a kill sequence is started on it;
//! - services direct-signal requests from the terminator;
//! - publishes the exit on the process's watch channel;
//! - deregisters itself (conditionally on generation) and reports whether
//!   it was stopped from outside rather than exiting on its own.
//!
//! Terminal `done` / `error` events are left to the runners, which know
//! what the process was for.

use std::sync::Arc;

use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::exec::pipe::{DRAIN_GRACE, spawn_pipe_reader};
use crate::process::{KillSignal, ManagedProcess, ProcessTracker, signal_child};
use crate::relay::EventSink;
use crate::types::{ExitInfo, ScriptEvent};

/// What the driver reports once the child is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub info: ExitInfo,
    /// A kill sequence (kill, replacement or shutdown) was started on the
    /// process before it exited.
    pub evicted: bool,
}

pub(crate) struct Driver {
    pub process: ManagedProcess,
    pub tracker: Arc<ProcessTracker>,
    pub sink: Arc<dyn EventSink>,
}

impl Driver {
    fn forward(&self, data: String) {
        let key = self.process.key();
        if self.process.is_stopping() {
            debug!(
                key,
                generation = self.process.generation(),
                "dropping output of a process that is being stopped"
            );
            return;
        }
        self.sink.publish(key, &ScriptEvent::Output { data });
    }

    pub async fn run(
        self,
        mut child: Child,
        mut direct_rx: mpsc::UnboundedReceiver<KillSignal>,
        exit_tx: watch::Sender<Option<ExitInfo>>,
    ) -> ProcessExit {
        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<String>();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_pipe_reader(stdout, chunk_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_pipe_reader(stderr, chunk_tx));
        }

        let mut pipes_open = !readers.is_empty();
        let mut signals_open = true;

        // Either the process exits on its own, or the terminator asks us to
        // signal the handle while we keep forwarding output.
        let info = loop {
            tokio::select! {
                chunk = chunk_rx.recv(), if pipes_open => match chunk {
                    Some(data) => self.forward(data),
                    None => pipes_open = false,
                },

                signal = direct_rx.recv(), if signals_open => match signal {
                    Some(signal) => {
                        debug!(key = self.process.key(), ?signal, "signalling child handle directly");
                        if let Err(e) = signal_child(&mut child, signal) {
                            debug!(key = self.process.key(), error = %e, "direct signal failed");
                        }
                    }
                    None => signals_open = false,
                },

                status = child.wait() => {
                    break match status {
                        Ok(status) => ExitInfo::from_status(status),
                        Err(e) => {
                            warn!(key = self.process.key(), error = %e, "failed waiting for child; treating as exit code 1");
                            ExitInfo::failure()
                        }
                    };
                }
            }
        };

        info!(
            key = self.process.key(),
            generation = self.process.generation(),
            exit_code = ?info.code,
            signal = ?info.signal,
            "process exited"
        );
        let _ = exit_tx.send(Some(info));

        if pipes_open {
            let drained = timeout(DRAIN_GRACE, async {
                while let Some(data) = chunk_rx.recv().await {
                    self.forward(data);
                }
            })
            .await;

            if drained.is_err() {
                debug!(key = self.process.key(), "output pipes still open after exit; abandoning them");
                for reader in &readers {
                    reader.abort();
                }
            }
        }

        // A kill sequence that found the process already exited removes the
        // entry without marking it; that exit still counts as its own.
        self.tracker
            .remove_if(self.process.key(), self.process.generation());
        ProcessExit {
            info,
            evicted: self.process.is_stopping(),
        }
    }
}
