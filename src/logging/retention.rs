//! Log file retention management
//!
//! Deletes the log file once it has aged past a threshold. Rotation is
//! housekeeping: every failure is absorbed into the returned outcome.

use std::fs;
use std::io;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::config::LogPaths;

/// Why a rotation pass did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// There is no log file to rotate
    Missing,
    /// The file's modification time could not be read
    Metadata,
    /// The file was old enough but could not be removed
    Remove,
    /// The rotation task was cancelled before it finished
    Interrupted,
}

/// Result of a best-effort rotation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// The file was older than the threshold and has been removed
    Deleted { age: Duration },
    /// The file is within the threshold and was left alone
    Kept { age: Duration },
    /// Nothing was done
    Skipped(SkipReason),
}

impl RotationOutcome {
    /// Whether the log file was removed
    pub fn deleted(&self) -> bool {
        matches!(self, RotationOutcome::Deleted { .. })
    }
}

/// Delete the log file if it was last modified more than `threshold` ago
pub fn delete_log_if_older_than<P>(paths: &P, threshold: Duration) -> RotationOutcome
where
    P: LogPaths + ?Sized,
{
    delete_log_if_older_than_at(paths, threshold, SystemTime::now())
}

/// Same as [`delete_log_if_older_than`], measuring age against `now`
pub fn delete_log_if_older_than_at<P>(
    paths: &P,
    threshold: Duration,
    now: SystemTime,
) -> RotationOutcome
where
    P: LogPaths + ?Sized,
{
    let path = paths.log_file();

    let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No log file at {} to rotate", path.display());
            return RotationOutcome::Skipped(SkipReason::Missing);
        }
        Err(e) => {
            warn!("Could not read log file age for {}: {}", path.display(), e);
            return RotationOutcome::Skipped(SkipReason::Metadata);
        }
    };

    // A modification time in the future counts as brand new
    let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
    if age <= threshold {
        return RotationOutcome::Kept { age };
    }

    match fs::remove_file(&path) {
        Ok(()) => {
            info!(
                "Deleted log file {} ({}s old)",
                path.display(),
                age.as_secs()
            );
            RotationOutcome::Deleted { age }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            RotationOutcome::Skipped(SkipReason::Missing)
        }
        Err(e) => {
            warn!("Could not delete old log file {}: {}", path.display(), e);
            RotationOutcome::Skipped(SkipReason::Remove)
        }
    }
}
