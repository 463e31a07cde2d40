use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::{self, LogConfig};

pub const LOG_ENV: &str = "MEDIAWEEK_LOG";

pub enum Target {
    /// The terminal UI owns stdout/stderr, so logs go to a file.
    File,
    Stderr,
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

pub fn log_file_path(cfg: &LogConfig) -> Option<PathBuf> {
    cfg.file.clone().or_else(config::default_log_path)
}

/// Installs the global subscriber. Returns the log file in use, if any.
pub fn init(cfg: &LogConfig, target: Target) -> Result<Option<PathBuf>> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(&cfg.level))
        .with_target(false)
        .with_line_number(true);

    match target {
        Target::Stderr => {
            let _ = builder.with_writer(std::io::stderr).try_init();
            Ok(None)
        }
        Target::File => {
            let Some(path) = log_file_path(cfg) else {
                return Ok(None);
            };
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("log: failed to create directory {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("log: failed to open {}", path.display()))?;
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
            Ok(Some(path))
        }
    }
}
