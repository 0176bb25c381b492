//! Serialized log forwarding
//!
//! Callers hand batches of lines to a bounded channel. A single task drains
//! the channel and writes each batch in arrival order, so concurrent
//! producers never interleave appends on the log file.

use std::io::BufRead;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use super::file_writer::LogFileWriter;
use super::line::{parse_log_line, LogLine};

/// Counters reported when the forwarder shuts down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwarderStats {
    /// Batches fully appended to the log file
    pub batches_written: usize,
    /// Lines across all written batches
    pub lines_written: usize,
    /// Batches whose write failed
    pub batches_failed: usize,
}

/// The forwarder task has stopped and can no longer accept lines
#[derive(Debug, thiserror::Error)]
#[error("log forwarder has shut down")]
pub struct ForwarderClosed;

/// Sending side of a running forwarder
#[derive(Debug)]
pub struct ForwarderHandle {
    sender: mpsc::Sender<Vec<LogLine>>,
    task: JoinHandle<ForwarderStats>,
}

/// Cloneable sender for additional producers
pub type LogSender = mpsc::Sender<Vec<LogLine>>;

impl ForwarderHandle {
    /// Queue a batch, waiting while the queue is full
    pub async fn send(&self, batch: Vec<LogLine>) -> Result<(), ForwarderClosed> {
        self.sender.send(batch).await.map_err(|_| ForwarderClosed)
    }

    /// Get a sender for another producer
    pub fn sender(&self) -> LogSender {
        self.sender.clone()
    }

    /// Close the queue, wait for pending batches to be written, and return the counters
    ///
    /// Batches queued through senders from [`ForwarderHandle::sender`] are still
    /// drained; the task ends once every sender has been dropped. Fails if the
    /// task panicked, in which case any undrained batches are lost.
    pub async fn shutdown(self) -> Result<ForwarderStats, JoinError> {
        drop(self.sender);
        self.task.await
    }
}

/// Spawns the task that owns all appends to one log file
pub struct LogForwarder;

impl LogForwarder {
    /// Start forwarding into `writer`
    ///
    /// # Arguments
    /// * `writer` - Log location to append to
    /// * `capacity` - Maximum number of batches to buffer before backpressure
    /// * `retention` - If set, delete the log at startup when it is older than this
    pub fn spawn(
        writer: LogFileWriter,
        capacity: usize,
        retention: Option<Duration>,
    ) -> ForwarderHandle {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(run(writer, receiver, retention));
        ForwarderHandle { sender, task }
    }
}

async fn run(
    writer: LogFileWriter,
    mut receiver: mpsc::Receiver<Vec<LogLine>>,
    retention: Option<Duration>,
) -> ForwarderStats {
    if let Some(threshold) = retention {
        let outcome = writer.delete_if_older_than(threshold).await;
        debug!("Startup log rotation: {:?}", outcome);
    }

    let mut stats = ForwarderStats::default();

    while let Some(batch) = receiver.recv().await {
        if batch.is_empty() {
            continue;
        }
        let count = batch.len();
        match writer.write_lines(batch).await {
            Ok(()) => {
                stats.batches_written += 1;
                stats.lines_written += count;
            }
            Err(e) => {
                stats.batches_failed += 1;
                warn!(
                    stage = ?e.stage(),
                    "Dropped {} log lines. {}",
                    count,
                    e.user_message()
                );
            }
        }
    }

    info!(
        "Log forwarder stopped after {} batches ({} lines, {} failed)",
        stats.batches_written, stats.lines_written, stats.batches_failed
    );
    stats
}

/// Parse text lines from `reader` and queue them in batches of `batch_size`
///
/// Blocking; call it from a blocking thread. Returns the number of lines
/// queued. On a read error the lines parsed so far are still queued before
/// the error is returned.
pub fn forward_lines<R: BufRead>(
    reader: R,
    sender: &LogSender,
    batch_size: usize,
) -> Result<usize> {
    let batch_size = batch_size.max(1);
    let mut batch: Vec<LogLine> = Vec::with_capacity(batch_size);
    let mut total = 0;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                if !batch.is_empty() {
                    // Queue what was read even though the input broke off
                    let _ = sender.blocking_send(batch);
                }
                return Err(e).context("Failed to read log input");
            }
        };
        if let Some(parsed) = parse_log_line(&line) {
            batch.push(parsed);
        }
        if batch.len() >= batch_size {
            total += batch.len();
            sender
                .blocking_send(std::mem::take(&mut batch))
                .map_err(|_| ForwarderClosed)?;
        }
    }

    if !batch.is_empty() {
        total += batch.len();
        sender.blocking_send(batch).map_err(|_| ForwarderClosed)?;
    }
    Ok(total)
}
