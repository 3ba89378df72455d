// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Boot logging
//!
//! A fixed-capacity ring of log entries owned by the boot context. There is
//! no global logger: whoever owns the buffer logs into it through the
//! `log_*!` macros, and the buffer can be drained for diagnostics before
//! the application is started.
//!
//! # Security
//!
//! - Key material must never be logged
//! - Messages longer than [`MAX_LOG_MESSAGE_LEN`] are truncated

use core::fmt::{self, Write};
use heapless::{HistoryBuffer, String};

/// Maximum log message length
pub const MAX_LOG_MESSAGE_LEN: usize = 96;

/// Log buffer size (number of entries)
pub const LOG_BUFFER_SIZE: usize = 32;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    /// Errors that require immediate attention
    Error = 0,
    /// Warnings about potential issues
    Warn = 1,
    /// Informational messages
    Info = 2,
    /// Debug messages
    Debug = 3,
    /// Very verbose messages
    Trace = 4,
}

impl LogLevel {
    /// Short prefix for the level
    #[must_use]
    pub const fn prefix(&self) -> char {
        match self {
            Self::Error => 'E',
            Self::Warn => 'W',
            Self::Info => 'I',
            Self::Debug => 'D',
            Self::Trace => 'T',
        }
    }
}

/// One log record
#[derive(Clone)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Sequence number (monotonic per buffer)
    pub seq: u32,
    /// Component tag
    pub module: &'static str,
    /// Message text
    pub message: String<MAX_LOG_MESSAGE_LEN>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:04} {} [{}] {}",
            self.seq,
            self.level.prefix(),
            self.module,
            self.message
        )
    }
}

impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Writer that silently truncates at capacity
struct Truncating<'a>(&'a mut String<MAX_LOG_MESSAGE_LEN>);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Circular log buffer
pub struct LogBuffer {
    entries: HistoryBuffer<LogEntry, LOG_BUFFER_SIZE>,
    next_seq: u32,
    min_level: LogLevel,
}

impl LogBuffer {
    /// Create an empty buffer recording `Info` and above
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: HistoryBuffer::new(),
            next_seq: 0,
            min_level: LogLevel::Info,
        }
    }

    /// Set the minimum recorded level
    pub fn set_min_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Check if a level would be recorded
    #[must_use]
    pub fn should_log(&self, level: LogLevel) -> bool {
        level <= self.min_level
    }

    /// Record a formatted message
    pub fn log(&mut self, level: LogLevel, module: &'static str, args: fmt::Arguments<'_>) {
        if !self.should_log(level) {
            return;
        }

        let mut message = String::new();
        let _ = Truncating(&mut message).write_fmt(args);

        self.entries.write(LogEntry {
            level,
            seq: self.next_seq,
            module,
            message,
        });
        self.next_seq = self.next_seq.wrapping_add(1);
    }

    /// Number of retained entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    /// Total entries ever recorded (including overwritten ones)
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.next_seq
    }

    /// Iterate retained entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.oldest_ordered()
    }

    /// Check if any retained entry of `module` contains `needle`
    #[must_use]
    pub fn contains(&self, module: &str, needle: &str) -> bool {
        self.iter()
            .any(|e| e.module == module && e.message.contains(needle))
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($buffer:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Error, $module, format_args!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($buffer:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Warn, $module, format_args!($($arg)*))
    };
}

/// Log an informational message
#[macro_export]
macro_rules! log_info {
    ($buffer:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Info, $module, format_args!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($buffer:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Debug, $module, format_args!($($arg)*))
    };
}

/// Log a trace message
#[macro_export]
macro_rules! log_trace {
    ($buffer:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Trace, $module, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        let mut log = LogBuffer::new();
        log_debug!(log, "test", "hidden {}", 1);
        assert!(log.is_empty());

        log.set_min_level(LogLevel::Debug);
        log_debug!(log, "test", "shown {}", 2);
        assert_eq!(log.len(), 1);
        assert!(log.contains("test", "shown 2"));
    }

    #[test]
    fn test_ring_keeps_newest() {
        let mut log = LogBuffer::new();
        for i in 0..(LOG_BUFFER_SIZE as u32 + 5) {
            log_info!(log, "ring", "entry {}", i);
        }
        assert_eq!(log.len(), LOG_BUFFER_SIZE);
        assert_eq!(log.total(), LOG_BUFFER_SIZE as u32 + 5);
        assert_eq!(log.iter().next().map(|e| e.seq), Some(5));
    }

    #[test]
    fn test_long_message_truncated() {
        let mut log = LogBuffer::new();
        let long = [b'x'; 200];
        let text = core::str::from_utf8(&long).unwrap();
        log_warn!(log, "trunc", "{}", text);
        assert_eq!(log.iter().next().unwrap().message.len(), MAX_LOG_MESSAGE_LEN);
    }
}
