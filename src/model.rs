//! Core value types shared across the merge and paging pipeline.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    #[serde(rename = "D")]
    Debug,
    #[serde(rename = "I")]
    Info,
    #[serde(rename = "W")]
    Warn,
    #[serde(rename = "E")]
    Error,
}

impl LogLevel {
    /// Guess a level from free-form log text by a case-insensitive token search.
    pub fn guess(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("error") || lower.contains("fatal") || lower.contains("panic") {
            LogLevel::Error
        } else if lower.contains("warn") {
            LogLevel::Warn
        } else if lower.contains("debug") || lower.contains("trace") {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Debug => "D",
            LogLevel::Info => "I",
            LogLevel::Warn => "W",
            LogLevel::Error => "E",
        };
        write!(f, "{s}")
    }
}

/// Fields pulled out of a raw line by a [`crate::parser::ParserRule`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ParsedFields {
    pub fn is_empty(&self) -> bool {
        self.time.is_none() && self.process.is_none() && self.pid.is_none()
    }
}

/// A single structured log record, the unit of merge, storage, and pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub ts: i64,
    pub level: LogLevel,
    #[serde(rename = "type")]
    pub type_key: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<ParsedFields>,
}

impl LogEntry {
    pub fn message(&self) -> &str {
        if let Some(parsed) = &self.parsed {
            if let Some(m) = &parsed.message {
                return m;
            }
        }
        self.text.as_deref().unwrap_or_default()
    }
}

/// Ordering used by the k-way merger's heap: descending ts, then ascending
/// type key, then ascending per-type sequence, all as a total order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeKey {
    pub ts: i64,
    pub type_key: String,
    pub seq: u64,
}

impl Ord for MergeKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ts
            .cmp(&other.ts)
            .then_with(|| other.type_key.cmp(&self.type_key))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for MergeKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
