//! A pure predicate over [`LogEntry`] used by pagination and search.

use crate::model::{LogEntry, LogLevel};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<HashSet<LogLevel>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<HashSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_substr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pids: Option<HashSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_substr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<(i64, i64)>,
}

impl Filter {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(levels) = &self.levels {
            if !levels.contains(&entry.level) {
                return false;
            }
        }
        if let Some(types) = &self.types {
            if !types.contains(&entry.type_key) {
                return false;
            }
        }
        if let Some(process) = &self.process_substr {
            let actual = entry.parsed.as_ref().and_then(|p| p.process.as_deref());
            if !actual.is_some_and(|p| p.contains(process.as_str())) {
                return false;
            }
        }
        if let Some(pids) = &self.pids {
            let actual = entry.parsed.as_ref().and_then(|p| p.pid.as_deref());
            if !actual.is_some_and(|pid| pids.contains(pid)) {
                return false;
            }
        }
        if let Some(message) = &self.message_substr {
            if !entry.message().contains(message.as_str()) {
                return false;
            }
        }
        if let Some((start, end)) = self.time_range {
            if entry.ts < start || entry.ts > end {
                return false;
            }
        }
        true
    }
}

/// A text search over the (already-filtered) space, independent of [`Filter`].
pub struct SearchQuery {
    pub text: String,
    pub regex: bool,
    pub case_sensitive: bool,
    compiled: Option<Regex>,
}

impl SearchQuery {
    pub fn new(text: String, regex: bool, case_sensitive: bool) -> Result<Self, regex::Error> {
        let compiled = if regex {
            let pattern = if case_sensitive {
                text.clone()
            } else {
                format!("(?i){text}")
            };
            Some(Regex::new(&pattern)?)
        } else {
            None
        };
        Ok(Self {
            text,
            regex,
            case_sensitive,
            compiled,
        })
    }

    pub fn matches_text(&self, haystack: &str) -> bool {
        if let Some(re) = &self.compiled {
            re.is_match(haystack)
        } else if self.case_sensitive {
            haystack.contains(&self.text)
        } else {
            haystack.to_lowercase().contains(&self.text.to_lowercase())
        }
    }
}
