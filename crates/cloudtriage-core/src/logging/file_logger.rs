//! File-based debug logger
//!
//! A process-wide logger that appends to `$TMPDIR/cloudtriage-debug.log`.
//! Disabled unless `CLOUDTRIAGE_DEBUG` is set to `1`/`true`; the minimum
//! level comes from `CLOUDTRIAGE_LOG_LEVEL`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::SystemTime;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// Parse a level name, falling back to `Debug` for anything unknown
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Debug,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO "),
            LogLevel::Warn => write!(f, "WARN "),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

struct FileLoggerState {
    file: Option<File>,
    min_level: LogLevel,
    enabled: bool,
}

impl FileLoggerState {
    fn new() -> Self {
        let enabled = std::env::var("CLOUDTRIAGE_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let min_level = std::env::var("CLOUDTRIAGE_LOG_LEVEL")
            .map(|v| LogLevel::parse(&v))
            .unwrap_or(LogLevel::Debug);

        // Only touch the filesystem when debugging is switched on
        let file = if enabled {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(Self::default_log_path())
                .ok()
        } else {
            None
        };

        Self { file, min_level, enabled }
    }

    fn default_log_path() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push("cloudtriage-debug.log");
        path
    }

    fn write(&mut self, level: LogLevel, module: &str, message: &str) {
        if !self.enabled || level < self.min_level {
            return;
        }

        if let Some(ref mut file) = self.file {
            let timestamp = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| {
                    let secs = d.as_secs();
                    let millis = d.subsec_millis();
                    let hours = (secs % 86400) / 3600;
                    let mins = (secs % 3600) / 60;
                    let secs = secs % 60;
                    format!("{:02}:{:02}:{:02}.{:03}", hours, mins, secs, millis)
                })
                .unwrap_or_else(|_| "??:??:??.???".to_string());

            let _ = writeln!(file, "[{}] [{}] [{}] {}", timestamp, level, module, message);
            let _ = file.flush();
        }
    }
}

static LOGGER: OnceLock<Mutex<FileLoggerState>> = OnceLock::new();

fn get_logger() -> &'static Mutex<FileLoggerState> {
    LOGGER.get_or_init(|| Mutex::new(FileLoggerState::new()))
}

/// Log a message at the specified level
pub fn log(level: LogLevel, module: &str, message: &str) {
    if let Ok(mut logger) = get_logger().lock() {
        logger.write(level, module, message);
    }
}

pub fn trace(module: &str, message: &str) {
    log(LogLevel::Trace, module, message);
}

pub fn debug(module: &str, message: &str) {
    log(LogLevel::Debug, module, message);
}

pub fn info(module: &str, message: &str) {
    log(LogLevel::Info, module, message);
}

pub fn warn(module: &str, message: &str) {
    log(LogLevel::Warn, module, message);
}

pub fn error(module: &str, message: &str) {
    log(LogLevel::Error, module, message);
}

/// Path of the debug log file
pub fn log_file_path() -> PathBuf {
    FileLoggerState::default_log_path()
}

/// Truncate the debug log file
pub fn clear_log() {
    let path = log_file_path();
    if let Ok(file) = File::create(&path) {
        drop(file);
    }
    if let Ok(mut logger) = get_logger().lock() {
        if logger.enabled {
            logger.file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert!(LogLevel::Debug > LogLevel::Trace);
        assert!(LogLevel::Info > LogLevel::Debug);
        assert!(LogLevel::Warn > LogLevel::Info);
        assert!(LogLevel::Error > LogLevel::Warn);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(LogLevel::parse("WARN"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::parse(" info "), LogLevel::Info);
        assert_eq!(LogLevel::parse("verbose"), LogLevel::Debug);
    }

    #[test]
    fn test_logging_does_not_panic() {
        debug("test", "test message");
        warn("test", "test message");
    }
}
