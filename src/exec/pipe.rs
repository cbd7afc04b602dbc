// src/exec/pipe.rs

//! Reading child stdout/stderr into UTF-8 chunks.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// How long to keep draining pipes after the child itself has exited.
///
/// Orphaned grandchildren can hold a pipe open indefinitely.
pub const DRAIN_GRACE: Duration = Duration::from_millis(500);

const READ_BUF: usize = 8 * 1024;

/// Read `reader` to EOF, sending decoded chunks to `tx` as they arrive.
///
/// Bytes of a multibyte sequence split across reads are carried over to the
/// next chunk; genuinely invalid bytes are replaced with U+FFFD.
pub fn spawn_pipe_reader<R>(mut reader: R, tx: mpsc::UnboundedSender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUF];
        let mut pending: Vec<u8> = Vec::new();

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    debug!(error = %err, "pipe read failed; stopping reader");
                    break;
                }
            };

            pending.extend_from_slice(&buf[..n]);
            let chunk = take_decodable(&mut pending);
            if !chunk.is_empty() && tx.send(chunk).is_err() {
                return;
            }
        }

        if !pending.is_empty() {
            let _ = tx.send(String::from_utf8_lossy(&pending).into_owned());
        }
    })
}

/// Split off the longest prefix of `pending` that can be decoded now.
fn take_decodable(pending: &mut Vec<u8>) -> String {
    let keep_from = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        // Incomplete sequence at the very end: keep it for the next read.
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => pending.len(),
    };

    let rest = pending.split_off(keep_from);
    let decoded = String::from_utf8_lossy(pending).into_owned();
    *pending = rest;
    decoded
}
