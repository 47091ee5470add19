//! Declarative line parsing: a small rule set maps a file's path glob to
//! regex extractors for `time`, `process`, `pid`, and `message`.

use crate::error::RuleError;
use crate::model::ParsedFields;
use crate::settings::ParserSettings;
use globset::{Glob, GlobMatcher};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// On-disk parser template, version 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserTemplate {
    pub version: u32,
    pub rules: Vec<RawRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRule {
    #[serde(rename = "match")]
    pub pattern: String,
    pub time: Option<String>,
    pub process: Option<String>,
    pub pid: Option<String>,
    pub message: Option<String>,
}

/// A compiled rule: glob matcher plus one optional regex per field.
pub struct ParserRule {
    pub pattern: String,
    matcher: GlobMatcher,
    time_re: Option<Regex>,
    process_re: Option<Regex>,
    pid_re: Option<Regex>,
    message_re: Option<Regex>,
}

impl ParserRule {
    fn compile(index: usize, raw: &RawRule) -> Result<Self, RuleError> {
        let matcher = Glob::new(&raw.pattern)
            .map_err(|source| RuleError::BadGlob {
                index,
                pattern: raw.pattern.clone(),
                source,
            })?
            .compile_matcher();
        let compile_field = |field: &'static str,
                              pattern: &Option<String>|
         -> Result<Option<Regex>, RuleError> {
            pattern
                .as_deref()
                .map(|p| Regex::new(p).map_err(|source| RuleError::BadRegex { index, field, source }))
                .transpose()
        };
        Ok(Self {
            pattern: raw.pattern.clone(),
            matcher,
            time_re: compile_field("time", &raw.time)?,
            process_re: compile_field("process", &raw.process)?,
            pid_re: compile_field("pid", &raw.pid)?,
            message_re: compile_field("message", &raw.message)?,
        })
    }

    pub fn matches_path(&self, rel_path: &str) -> bool {
        self.matcher.is_match(rel_path)
    }

    /// Extract whichever fields have a configured regex with a matching capture.
    pub fn extract(&self, line: &str) -> ParsedFields {
        ParsedFields {
            time: extract_one(&self.time_re, "time", line),
            process: extract_one(&self.process_re, "process", line),
            pid: extract_one(&self.pid_re, "pid", line),
            message: extract_one(&self.message_re, "message", line),
        }
    }
}

/// Extracts a field's text: prefers a named group matching `field` (e.g.
/// `(?<time>...)`) over the first positional group, so a multi-group regex
/// with its named group anywhere in the pattern still resolves correctly.
fn extract_one(re: &Option<Regex>, field: &str, line: &str) -> Option<String> {
    let re = re.as_ref()?;
    let caps = re.captures(line)?;
    let text = caps
        .name(field)
        .or_else(|| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or("");
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Compiled, ready-to-use rule set.
pub struct RuleSet {
    rules: Vec<ParserRule>,
    settings: ParserSettings,
}

impl RuleSet {
    pub fn compile(template: &ParserTemplate, settings: ParserSettings) -> Result<Self, RuleError> {
        if template.version != 1 {
            return Err(RuleError::BadVersion {
                found: template.version,
            });
        }
        let rules = template
            .rules
            .iter()
            .enumerate()
            .map(|(i, raw)| ParserRule::compile(i, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules, settings })
    }

    /// Deterministic: the first declared rule whose glob matches wins.
    pub fn match_rule_for_path(&self, rel_path: &str) -> Option<&ParserRule> {
        self.rules.iter().find(|r| r.matches_path(rel_path))
    }

    /// Bounded preflight over the file's first non-blank lines: a rule is
    /// considered usable for the file when at least `gate_threshold_pct`
    /// percent of the sample lines produce a non-empty `time` extraction.
    pub fn should_use_parser_for_file(&self, rule: &ParserRule, sample_lines: &[&str]) -> bool {
        let sample: Vec<&&str> = sample_lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .take(self.settings.gate_preflight_lines)
            .collect();
        if sample.is_empty() {
            return false;
        }
        let matched = sample
            .iter()
            .filter(|l| extract_one(&rule.time_re, "time", l).is_some())
            .count();
        let pct = (matched * 100) / sample.len();
        pct as u8 >= self.settings.gate_threshold_pct
    }
}
