use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "GUIDED_OPS_LOG";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn log_file_path() -> Result<PathBuf> {
    let dir = dirs::data_local_dir()
        .or_else(dirs::config_dir)
        .ok_or_else(|| anyhow!("Could not determine a data directory for logs"))?;
    Ok(dir.join("guided-ops").join("guided-ops.log"))
}

/// Log to a file; the terminal belongs to the TUI while it runs.
pub fn init_file() -> Result<PathBuf> {
    let path = log_file_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install logger: {}", e))?;

    Ok(path)
}

/// Log to stderr for one-shot subcommands.
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();
}
