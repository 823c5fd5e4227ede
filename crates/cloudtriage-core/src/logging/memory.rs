//! Logger that keeps every line in memory

use parking_lot::Mutex;

use super::file_logger::LogLevel;
use super::traits::Logger;

/// A captured log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
}

/// Logger that records lines instead of printing them
///
/// Used by tests to check what the orchestration core reports, in particular
/// that tokens and account ids never show up in clear text.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured lines, oldest first
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// True if any captured line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.records.lock().iter().any(|r| r.message.contains(needle))
    }

    /// Number of captured lines at `level`
    pub fn count(&self, level: LogLevel) -> usize {
        self.records.lock().iter().filter(|r| r.level == level).count()
    }

    fn push(&self, level: LogLevel, message: &str) {
        self.records.lock().push(LogRecord {
            level,
            message: message.to_string(),
        });
    }
}

impl Logger for MemoryLogger {
    fn debug(&self, message: &str) {
        self.push(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }
}
