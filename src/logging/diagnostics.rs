//! Diagnostics for ndlog itself
//!
//! The crate's own tracing output goes to stderr so it never mixes with the
//! NDJSON log file it manages.

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a stderr tracing subscriber filtered by `RUST_LOG` (default `ndlog=info`)
pub fn init_diagnostics() -> Result<()> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ndlog=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()?;

    Ok(())
}
