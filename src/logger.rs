//! Debug logging support for SwapX
//!
//! When debug mode is enabled via config or `--debug`, operations are logged
//! to ~/.swapx/swapx.log. `RUST_LOG` overrides the default filter.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

const DEFAULT_FILTER: &str = "swapx=debug";

/// Set up file logging at `log_path` when `enabled`.
///
/// Returns the log path, or None if logging is off or the file could not be
/// opened. A log file problem is reported once on stderr and never fails the run.
pub fn init_debug_logging(enabled: bool, log_path: &Path) -> Result<Option<PathBuf>> {
    if !enabled {
        return Ok(None);
    }

    let log_file = match open_log_file(log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: debug log disabled: {:#}", e);
            return Ok(None);
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let file_layer = fmt::layer()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(true);

    registry()
        .with(file_layer)
        .with(filter)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(Some(log_path.to_path_buf()))
}

fn open_log_file(log_path: &Path) -> Result<File> {
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }

    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))
}

/// ~/.swapx/swapx.log
pub fn default_log_path() -> Result<PathBuf> {
    Ok(crate::config::config_dir()?.join("swapx.log"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_disabled_logging_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("logs").join("swapx.log");

        assert_eq!(init_debug_logging(false, &log_path).unwrap(), None);
        assert!(!log_path.exists());
    }

    #[test]
    fn test_open_log_file_creates_parent() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("nested").join("swapx.log");

        open_log_file(&log_path).unwrap();
        assert!(log_path.exists());
    }
}
