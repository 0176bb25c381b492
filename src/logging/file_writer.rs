//! Append-only NDJSON log file writer
//!
//! Each call makes sure the log directory and file exist, then appends its
//! lines one at a time in input order. A line is either fully on disk or not
//! at all: if a write fails mid-line, the file is truncated back to the end
//! of the last committed line.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, warn};

use super::line::LogLine;
use super::retention::{self, RotationOutcome, SkipReason};
use crate::config::LogPaths;

/// Stage of a log write that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    DirectoryCreate,
    FileCreate,
    Open,
    Serialize,
    Write,
    Close,
    Task,
}

/// Errors surfaced by `write_log_lines`
#[derive(Debug, Error)]
pub enum LogWriteError {
    /// The log directory was missing and could not be created
    #[error("failed to create log directory {path}: {source}")]
    DirectoryCreate { path: PathBuf, source: io::Error },

    /// The log file was missing and could not be created
    #[error("failed to create log file {path}: {source}")]
    FileCreate { path: PathBuf, source: io::Error },

    /// The log file could not be opened for appending
    #[error("failed to open log file {path} for append: {source}")]
    Open { path: PathBuf, source: io::Error },

    /// A line could not be encoded as JSON
    #[error("failed to serialize log line {index}: {source}")]
    Serialize {
        index: usize,
        source: serde_json::Error,
    },

    /// Appending a line failed; lines before `index` are on disk
    #[error("failed to write log line {index}: {source}")]
    Write { index: usize, source: io::Error },

    /// Flushing or syncing the file on close failed
    #[error("failed to close log file {path}: {source}")]
    Close { path: PathBuf, source: io::Error },

    /// The blocking write task panicked or was cancelled
    #[error("log write task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl LogWriteError {
    /// Which stage of the write failed
    pub fn stage(&self) -> WriteStage {
        match self {
            LogWriteError::DirectoryCreate { .. } => WriteStage::DirectoryCreate,
            LogWriteError::FileCreate { .. } => WriteStage::FileCreate,
            LogWriteError::Open { .. } => WriteStage::Open,
            LogWriteError::Serialize { .. } => WriteStage::Serialize,
            LogWriteError::Write { .. } => WriteStage::Write,
            LogWriteError::Close { .. } => WriteStage::Close,
            LogWriteError::Task(_) => WriteStage::Task,
        }
    }

    /// The underlying IO error, if this stage failed on IO
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            LogWriteError::DirectoryCreate { source, .. }
            | LogWriteError::FileCreate { source, .. }
            | LogWriteError::Open { source, .. }
            | LogWriteError::Write { source, .. }
            | LogWriteError::Close { source, .. } => Some(source),
            LogWriteError::Serialize { .. } | LogWriteError::Task(_) => None,
        }
    }

    /// One-line description for diagnostics shown to people
    pub fn user_message(&self) -> String {
        let action = match self.stage() {
            WriteStage::DirectoryCreate => "Couldn't create the log directory",
            WriteStage::FileCreate => "Couldn't create the log file",
            WriteStage::Open => "Couldn't open the log file",
            WriteStage::Serialize => "Couldn't encode a log line",
            WriteStage::Write => "Couldn't append to the log file",
            WriteStage::Close => "Couldn't sync the log file",
            WriteStage::Task => "Log write was interrupted",
        };
        match self {
            LogWriteError::Serialize { source, .. } => format!("{}: {}", action, source),
            LogWriteError::Task(e) => format!("{}: {}", action, e),
            _ => match self.io_error() {
                Some(io) => format!("{}: {}", action, describe_io_error(io)),
                None => action.to_string(),
            },
        }
    }
}

/// Name the common disk failures plainly, fall back to the OS text otherwise
fn describe_io_error(e: &io::Error) -> String {
    match e.kind() {
        io::ErrorKind::PermissionDenied => return "permission denied".to_string(),
        io::ErrorKind::NotFound => return "no such file or directory".to_string(),
        io::ErrorKind::WriteZero => return "disk full".to_string(),
        _ => {}
    }
    // ENOSPC = 28; EDQUOT = 122 on Linux, 69 on macOS
    #[cfg(unix)]
    {
        if matches!(e.raw_os_error(), Some(28) | Some(122) | Some(69)) {
            return "disk full".to_string();
        }
    }
    e.to_string()
}

/// Appends whole lines to a writer, tracking how many bytes are committed
pub(crate) struct LineAppender<W: Write> {
    writer: W,
    committed: u64,
}

impl<W: Write> LineAppender<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self {
            writer,
            committed: 0,
        }
    }

    /// Bytes belonging to fully written lines
    pub(crate) fn committed(&self) -> u64 {
        self.committed
    }

    pub(crate) fn into_inner(self) -> W {
        self.writer
    }

    /// Write `lines` in order, each one completing before the next starts
    pub(crate) fn append_all(&mut self, lines: &[LogLine]) -> Result<(), LogWriteError> {
        for (index, line) in lines.iter().enumerate() {
            // Encode the whole record up front so a serialization failure never writes a fragment
            let record = line
                .to_ndjson()
                .map_err(|source| LogWriteError::Serialize { index, source })?;

            self.writer
                .write_all(record.as_bytes())
                .and_then(|_| self.writer.flush())
                .map_err(|source| LogWriteError::Write { index, source })?;

            self.committed += record.len() as u64;
        }
        Ok(())
    }
}

/// Append target that can drop a trailing fragment and be closed
pub(crate) trait LogSink: Write {
    /// Current end of the sink in bytes
    fn end_offset(&self) -> io::Result<u64>;

    /// Cut the sink back to `len` bytes
    fn truncate(&self, len: u64) -> io::Result<()>;

    /// Flush buffered bytes and make them durable
    fn close(&mut self) -> io::Result<()>;
}

impl LogSink for File {
    fn end_offset(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().append(true).open(path)
}

/// Append `lines` to the log file named by `paths`
///
/// An empty slice returns immediately without touching the filesystem.
pub fn write_log_lines<P>(paths: &P, lines: &[LogLine]) -> Result<(), LogWriteError>
where
    P: LogPaths + ?Sized,
{
    write_log_lines_with(paths, lines, open_append)
}

/// `write_log_lines` with the append handle produced by `open`
pub(crate) fn write_log_lines_with<P, S, F>(
    paths: &P,
    lines: &[LogLine],
    open: F,
) -> Result<(), LogWriteError>
where
    P: LogPaths + ?Sized,
    S: LogSink,
    F: FnOnce(&Path) -> io::Result<S>,
{
    if lines.is_empty() {
        return Ok(());
    }

    let dir = paths.log_dir();
    let path = paths.log_file();

    if !dir.is_dir() {
        fs::create_dir_all(&dir).map_err(|source| LogWriteError::DirectoryCreate {
            path: dir.clone(),
            source,
        })?;
    }

    if !path.exists() {
        File::create(&path).map_err(|source| LogWriteError::FileCreate {
            path: path.clone(),
            source,
        })?;
    }

    let open_err = |source| LogWriteError::Open {
        path: path.clone(),
        source,
    };
    let sink = open(&path).map_err(open_err)?;
    let start = sink.end_offset().map_err(open_err)?;

    let mut appender = LineAppender::new(sink);
    let written = appender.append_all(lines);
    let committed = start + appender.committed();
    let mut sink = appender.into_inner();

    match written {
        Ok(()) => {
            sink.close().map_err(|source| LogWriteError::Close {
                path: path.clone(),
                source,
            })?;
            debug!("Wrote {} log lines to {}", lines.len(), path.display());
            Ok(())
        }
        Err(e) => {
            if let Err(rollback_err) = sink.truncate(committed) {
                warn!(
                    "Failed to drop partial log line from {}: {}",
                    path.display(),
                    rollback_err
                );
            }
            // The write error wins over any close error
            let _ = sink.close();
            Err(e)
        }
    }
}

/// Read every line back from the log file
///
/// Returns an empty vec if the file doesn't exist. Blank lines are skipped.
pub fn read_log_lines<P>(paths: &P) -> Result<Vec<LogLine>>
where
    P: LogPaths + ?Sized,
{
    read_log_file(&paths.log_file())
}

fn read_log_file(path: &Path) -> Result<Vec<LogLine>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path).context("Failed to open log file")?;
    let mut lines = Vec::new();

    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("Failed to read log file")?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = serde_json::from_str(&line)
            .with_context(|| format!("Malformed log line {}", number + 1))?;
        lines.push(parsed);
    }

    Ok(lines)
}

/// Async handle over one log location
///
/// Blocking file IO runs on tokio's blocking pool. The writer does not
/// serialize concurrent callers; route them through a `LogForwarder` for that.
#[derive(Clone)]
pub struct LogFileWriter {
    paths: Arc<dyn LogPaths + Send + Sync>,
}

impl LogFileWriter {
    /// Create a writer for the given location
    pub fn new(paths: impl LogPaths + Send + Sync + 'static) -> Self {
        Self {
            paths: Arc::new(paths),
        }
    }

    /// Path of the log file this writer targets
    pub fn log_file(&self) -> PathBuf {
        self.paths.log_file()
    }

    /// Append `lines` in order; see [`write_log_lines`]
    pub async fn write_lines(&self, lines: Vec<LogLine>) -> Result<(), LogWriteError> {
        if lines.is_empty() {
            return Ok(());
        }
        let paths = Arc::clone(&self.paths);
        tokio::task::spawn_blocking(move || write_log_lines(paths.as_ref(), &lines)).await?
    }

    /// Delete the log file if it is older than `threshold`; never fails
    pub async fn delete_if_older_than(&self, threshold: Duration) -> RotationOutcome {
        let paths = Arc::clone(&self.paths);
        let task = tokio::task::spawn_blocking(move || {
            retention::delete_log_if_older_than(paths.as_ref(), threshold)
        });
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Log rotation task did not complete: {}", e);
                RotationOutcome::Skipped(SkipReason::Interrupted)
            }
        }
    }

    /// Read the log file back; see [`read_log_lines`]
    pub async fn read_lines(&self) -> Result<Vec<LogLine>> {
        let paths = Arc::clone(&self.paths);
        tokio::task::spawn_blocking(move || read_log_lines(paths.as_ref()))
            .await
            .context("Log read task did not complete")?
    }
}
