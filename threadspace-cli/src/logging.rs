//! File logging for the harness binary.
//!
//! Stdout carries the REPL, so log output goes to
//! `<config_dir>/threadspace/threadspace.log`, falling back to the temp dir.
//! `THREADSPACE_LOG` (a level name) overrides the level picked by `--verbose`.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use simplelog::{ConfigBuilder, LevelFilter, ThreadLogMode, WriteLogger};
use thiserror::Error;

pub const LEVEL_ENV: &str = "THREADSPACE_LOG";

#[derive(Debug, Error)]
pub enum LogInitError {
    #[error("cannot create log file: {0}")]
    Create(#[from] io::Error),
    #[error("logger already installed: {0}")]
    Install(#[from] log::SetLoggerError),
}

pub fn log_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("threadspace")
        .join("threadspace.log")
}

/// An explicit level name wins over the verbose flag. Unknown names are
/// ignored.
pub fn level(verbose: bool, requested: Option<&str>) -> LevelFilter {
    requested
        .and_then(|name| name.trim().parse().ok())
        .unwrap_or(if verbose { LevelFilter::Debug } else { LevelFilter::Warn })
}

/// Open `primary` for writing, creating its parent directory, or `fallback`
/// if that fails. Returns the file and the path actually used.
pub fn open_log_file(primary: &Path, fallback: &Path) -> io::Result<(File, PathBuf)> {
    let attempt = primary
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| File::create(primary));
    match attempt {
        Ok(file) => Ok((file, primary.to_path_buf())),
        Err(e) => {
            eprintln!("threadspace: {}: {}, logging to {}", primary.display(), e, fallback.display());
            File::create(fallback).map(|file| (file, fallback.to_path_buf()))
        }
    }
}

/// Install the global logger. Returns the log file path.
pub fn init(verbose: bool) -> Result<PathBuf, LogInitError> {
    let requested = std::env::var(LEVEL_ENV).ok();
    let level = level(verbose, requested.as_deref());
    let fallback = std::env::temp_dir().join("threadspace.log");
    let (file, path) = open_log_file(&log_path(), &fallback)?;

    // Delivery and heartbeat workers are named threads, so tag lines with them.
    let config = ConfigBuilder::new()
        .set_thread_level(LevelFilter::Error)
        .set_thread_mode(ThreadLogMode::Names)
        .set_target_level(LevelFilter::Error)
        .set_time_format_rfc3339()
        .build();
    WriteLogger::init(level, config, file)?;

    log::info!("threadspace starting (log level: {:?}, file: {})", level, path.display());
    Ok(path)
}
