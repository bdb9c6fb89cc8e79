use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Deserialize;

/// Log verbosity levels selectable from the command line or config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Nothing,
    Error,
    Warning,
    #[default]
    Info,
    Debug,
    All,
}

impl LogLevel {
    /// Map onto the `log` facade's filter
    pub fn as_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Nothing => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::All => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "nothing" | "off" | "none" => Ok(LogLevel::Nothing),
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "all" | "trace" => Ok(LogLevel::All),
            _ => anyhow::bail!(
                "Invalid log level: {}. Valid options: nothing, error, warning, info, debug, all",
                s
            ),
        }
    }
}

/// Logger writing to stderr and, optionally, a log file
struct PerformerLogger {
    level: log::LevelFilter,
    file: Option<Mutex<File>>,
}

impl PerformerLogger {
    fn format(record: &log::Record<'_>) -> String {
        format!("[{:<5} {}] {}", record.level(), record.target(), record.args())
    }
}

impl log::Log for PerformerLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format(record);
        eprintln!("{}", line);
        if let Some(file) = &self.file {
            // A failed write to the log file must never take the performer down
            let _ = writeln!(file.lock(), "{}", line);
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Install the process-wide logger
///
/// Calling this twice is an error (the `log` facade only accepts one logger).
pub fn init(level: LogLevel, log_file: Option<&Path>) -> Result<()> {
    let file = match log_file {
        Some(path) => Some(Mutex::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?,
        )),
        None => None,
    };

    let logger = PerformerLogger {
        level: level.as_filter(),
        file,
    };
    log::set_boxed_logger(Box::new(logger)).context("Logger already installed")?;
    log::set_max_level(level.as_filter());
    Ok(())
}
