use anyhow::{Context, Result};

use ndlog::config::{Config, LogPaths};
use ndlog::logging::{self, LogFileWriter, LogForwarder};

/// Lines per batch handed to the forwarder
const BATCH_SIZE: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_diagnostics()?;

    let config = Config::load()?;
    let writer = LogFileWriter::new(config.paths());
    tracing::info!("Logging to: {}", writer.log_file().display());

    // Rotation runs inside the forwarder before the first batch is written
    let handle = LogForwarder::spawn(writer, config.queue_capacity, config.retention());
    let sender = handle.sender();

    // Stdin is read on a blocking thread and handed over in batches
    let reader = tokio::task::spawn_blocking(move || {
        logging::forward_lines(std::io::stdin().lock(), &sender, BATCH_SIZE)
    });
    let read = reader.await.context("Stdin reader did not complete");

    // Drain whatever was queued before reporting a read failure
    let stats = handle
        .shutdown()
        .await
        .context("Log forwarder stopped unexpectedly, queued lines were lost")?;
    let read = read??;

    if stats.batches_failed > 0 || stats.lines_written < read {
        anyhow::bail!(
            "{} of {} lines could not be written to {}",
            read - stats.lines_written,
            read,
            config.log_file().display()
        );
    }

    Ok(())
}
