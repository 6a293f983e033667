//! Mapping of log levels onto ANS severity and category.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::types::{Category, Severity};

/// Log levels that can be classified into an ANS severity/category pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

const LEVEL_NAMES: [&str; 7] = ["trace", "debug", "info", "warn", "error", "fatal", "panic"];

// Indexed by `LogLevel as usize`.
const CLASSIFICATION: [(Severity, Category); 7] = [
    (Severity::Info, Category::Notification),
    (Severity::Info, Category::Notification),
    (Severity::Info, Category::Notification),
    (Severity::Warning, Category::Alert),
    (Severity::Error, Category::Exception),
    (Severity::Fatal, Category::Exception),
    (Severity::Fatal, Category::Exception),
];

/// Translate a log level into the ANS severity and category
///
/// ```rust
/// use alert_notification_api::{classify, Category, LogLevel, Severity};
///
/// assert_eq!(classify(LogLevel::Warn), (Severity::Warning, Category::Alert));
/// ```
pub fn classify(level: LogLevel) -> (Severity, Category) {
    CLASSIFICATION[level as usize]
}

impl LogLevel {
    /// Lower-case name of the level
    pub fn as_str(&self) -> &'static str {
        LEVEL_NAMES[*self as usize]
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known log level
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown log level '{0}'")]
pub struct UnknownLogLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLogLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            "panic" => Ok(LogLevel::Panic),
            _ => Err(UnknownLogLevel(s.to_string())),
        }
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}
