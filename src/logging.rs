//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over the configured level. Events go to
//! stdout, stderr or an append-mode file, as text or JSON lines.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the global subscriber. Later calls are no-ops.
///
/// `verbose` raises the configured level to at least `debug`.
pub fn init(settings: &LoggingSettings, verbose: bool) -> anyhow::Result<()> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    let level = effective_level(&settings.level, verbose);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("failed to configure tracing level")?;

    let (writer, ansi) = make_writer(&settings.output, settings.file_path.as_deref())?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false);

    let installed = if settings.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

/// Configured level, raised to `debug` when verbose output is requested.
pub fn effective_level(level: &str, verbose: bool) -> &str {
    match (verbose, level) {
        (true, "trace") => "trace",
        (true, _) => "debug",
        (false, level) => level,
    }
}

fn make_writer(output: &str, file_path: Option<&Path>) -> anyhow::Result<(BoxMakeWriter, bool)> {
    match output {
        "stdout" => Ok((BoxMakeWriter::new(io::stdout), true)),
        "file" => {
            let path = file_path.context("logging.file_path is required for file output")?;
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create log directory {}", parent.display())
                    })?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Ok((BoxMakeWriter::new(Mutex::new(file)), false))
        }
        _ => Ok((BoxMakeWriter::new(io::stderr), true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_effective_level() {
        assert_eq!(effective_level("warn", false), "warn");
        assert_eq!(effective_level("warn", true), "debug");
        assert_eq!(effective_level("trace", true), "trace");
    }

    #[test]
    fn test_file_writer_creates_parent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs").join("goinsight.log");
        let (_, ansi) = make_writer("file", Some(&path)).unwrap();
        assert!(!ansi);
        assert!(path.exists());
    }

    #[test]
    fn test_file_writer_requires_path() {
        assert!(make_writer("file", None).is_err());
    }
}
