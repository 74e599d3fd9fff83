//! Development-time tracing.
//!
//! Reads `RUST_LOG`, defaulting to `warn`. The interactive session owns the
//! terminal, so it logs to a file; the plain subcommands log to stderr.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Log to stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=beacon=debug beacon ls
/// ```
pub fn init_stderr() {
    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// Append to `path`, creating its directory on demand.
pub fn init_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    tracing_subscriber::registry()
        .with(filter())
        .with(
            fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .compact(),
        )
        .init();
    Ok(())
}
