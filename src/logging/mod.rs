//! Logging system for ndlog
//!
//! Provides the NDJSON log file writer, age-based rotation, a serializing
//! forwarder for concurrent producers, and stderr diagnostics setup.

mod diagnostics;
mod file_writer;
mod forwarder;
mod line;
mod retention;

pub use diagnostics::init_diagnostics;
pub use file_writer::{read_log_lines, write_log_lines, LogFileWriter, LogWriteError, WriteStage};
pub use forwarder::{
    forward_lines, ForwarderClosed, ForwarderHandle, ForwarderStats, LogForwarder, LogSender,
};
pub use line::{parse_log_line, LogLevel, LogLine};
pub use retention::{
    delete_log_if_older_than, delete_log_if_older_than_at, RotationOutcome, SkipReason,
};
