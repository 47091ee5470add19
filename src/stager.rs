//! For one producer ("type"), reads all of its rotated files newest-to-oldest,
//! parses, time-corrects, and writes a single descending-by-ts NDJSON staging
//! file consumed by [`crate::merger::KWayMerger`].

use crate::model::LogEntry;
use crate::parser::RuleSet;
use crate::readers::ReverseLineReader;
use crate::settings::TimezoneSettings;
use crate::time::{self, TimezoneCorrector};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

static TYPE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(log|txt)(?:\.\d+)?$").unwrap());
static ROTATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.log\.(\d+)$").unwrap());

/// Extracts the producer key from a rotated file name, e.g. `foo.log.2` -> `foo`.
pub fn type_key_of(path: &Path) -> String {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    match TYPE_SUFFIX_RE.find(name) {
        Some(m) => name[..m.start()].to_string(),
        None => name.to_string(),
    }
}

/// Ordering key for rotated files within one type: `.log` is newest (-1),
/// `.log.N` increases with age, anything else sorts last.
pub fn rotation_number(path: &Path) -> i64 {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    if let Some(caps) = ROTATION_RE.captures(name) {
        return caps[1].parse().unwrap_or(9999);
    }
    if name.ends_with(".log") || name.ends_with(".txt") {
        return -1;
    }
    9999
}

/// Groups input files by type, each group sorted newest-to-oldest.
pub fn group_by_type(files: &[PathBuf]) -> BTreeMap<String, Vec<PathBuf>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for file in files {
        groups.entry(type_key_of(file)).or_default().push(file.clone());
    }
    for group in groups.values_mut() {
        group.sort_by_key(|f| rotation_number(f));
    }
    groups
}

/// Lists `*.log`, `*.log.<N>`, and `*.txt` files directly under `dir`.
pub fn list_input_log_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if TYPE_SUFFIX_RE.is_match(&name) {
            out.push(entry.path());
        }
    }
    Ok(out)
}

/// Stages one type's rotated files into `{out_dir}/{type_key}.jsonl`, sorted
/// strictly descending by `ts`. `next_id` is a caller-owned counter so ids
/// stay unique across types within one session.
pub fn stage_type(
    type_key: &str,
    files_newest_first: &[PathBuf],
    rules: Option<&RuleSet>,
    tz_settings: &TimezoneSettings,
    out_dir: &Path,
    next_id: &mut u64,
) -> io::Result<PathBuf> {
    let mut buffer: Vec<LogEntry> = Vec::new();
    let mut tzc = TimezoneCorrector::new(tz_settings);
    let mut global_idx = 0usize;

    for file in files_newest_first {
        let mtime_ms = file_mtime_ms(file);
        let name = file.file_name().and_then(|s| s.to_str()).unwrap_or("");
        let rule = rules.and_then(|rs| rs.match_rule_for_path(name));

        let mut reader = ReverseLineReader::open(file)?;
        let mut prev_ts: Option<i64> = None;
        while let Some(line) = reader.next_line()? {
            let parsed = rule.map(|r| r.extract(&line));
            let time_str = parsed.as_ref().and_then(|p| p.time.as_deref());
            let raw_ts = time::parse_ts(time_str.unwrap_or(&line), mtime_ms);
            let ts = time::dedupe_tie(raw_ts, prev_ts);
            prev_ts = Some(ts);

            let adjusted = tzc.adjust(ts, global_idx);
            for seg in tzc.drain_retro_segments() {
                for e in buffer.iter_mut().take(seg.end + 1).skip(seg.start) {
                    e.ts += seg.delta;
                }
            }

            let level = time::guess_level(&line);
            let parsed = parsed.filter(|p| !p.is_empty());
            buffer.push(LogEntry {
                id: *next_id,
                ts: adjusted,
                level,
                type_key: type_key.to_string(),
                source: type_key.to_string(),
                text: Some(line),
                parsed,
            });
            *next_id += 1;
            global_idx += 1;
        }
    }
    tzc.finalize_suspected();

    // Stable sort: ties keep their original (most-recent-file-first) order.
    buffer.sort_by(|a, b| b.ts.cmp(&a.ts));

    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("{type_key}.jsonl"));
    let mut contents = String::new();
    for entry in &buffer {
        contents.push_str(&serde_json::to_string(entry).expect("LogEntry always serializes"));
        contents.push('\n');
    }
    std::fs::write(&path, contents)?;
    Ok(path)
}

/// Parses one raw line into a (still tz-uncorrected) [`LogEntry`]. Shared by
/// [`stage_type`] and [`crate::warmup`]'s tail walker.
pub fn parse_raw_line(
    line: String,
    type_key: &str,
    rule: Option<&crate::parser::ParserRule>,
    mtime_ms: Option<i64>,
    prev_ts: Option<i64>,
    id: u64,
) -> (LogEntry, i64) {
    let parsed = rule.map(|r| r.extract(&line));
    let time_str = parsed.as_ref().and_then(|p| p.time.as_deref());
    let raw_ts = time::parse_ts(time_str.unwrap_or(&line), mtime_ms);
    let ts = time::dedupe_tie(raw_ts, prev_ts);
    let level = time::guess_level(&line);
    let parsed = parsed.filter(|p| !p.is_empty());
    (
        LogEntry {
            id,
            ts,
            level,
            type_key: type_key.to_string(),
            source: type_key.to_string(),
            text: Some(line),
            parsed,
        },
        ts,
    )
}

/// Walks a type's rotated files sequentially, newest-to-oldest, pulling up
/// to `n` raw (tz-uncorrected) entries per call via [`ReverseLineReader`].
pub struct TypeTailWalker {
    type_key: String,
    files: std::collections::VecDeque<PathBuf>,
    rules: Option<*const RuleSet>,
    current: Option<ReverseLineReader>,
    current_mtime: Option<i64>,
    prev_ts: Option<i64>,
    next_id: u64,
    exhausted: bool,
}

// SAFETY: `rules` only ever points at a RuleSet owned by the caller for the
// lifetime of the warmup pass; TypeTailWalker never outlives it and is not
// sent across threads. A raw pointer here avoids threading a lifetime
// parameter through WarmupPrepass's per-type walker vector.
unsafe impl Send for TypeTailWalker {}

impl TypeTailWalker {
    pub fn new(type_key: String, files_newest_first: Vec<PathBuf>, rules: Option<&RuleSet>) -> Self {
        Self {
            type_key,
            files: files_newest_first.into(),
            rules: rules.map(|r| r as *const RuleSet),
            current: None,
            current_mtime: None,
            prev_ts: None,
            next_id: 0,
            exhausted: false,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    fn rules(&self) -> Option<&RuleSet> {
        self.rules.map(|p| unsafe { &*p })
    }

    fn advance_file(&mut self) -> io::Result<bool> {
        loop {
            let Some(path) = self.files.pop_front() else {
                self.exhausted = true;
                return Ok(false);
            };
            self.current_mtime = file_mtime_ms(&path);
            match ReverseLineReader::open(&path) {
                Ok(r) => {
                    self.current = Some(r);
                    return Ok(true);
                }
                Err(_) => continue,
            }
        }
    }

    /// Pulls up to `n` entries; returns fewer than `n` only when every file
    /// in this type's group has been exhausted.
    pub fn next_n(&mut self, n: usize) -> io::Result<Vec<LogEntry>> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            if self.current.is_none() && !self.advance_file()? {
                break;
            }
            let name = self
                .files
                .front()
                .and_then(|p| p.file_name())
                .and_then(|s| s.to_str())
                .unwrap_or("")
                .to_string();
            let rule = self.rules().and_then(|rs| rs.match_rule_for_path(&name));
            let line = self.current.as_mut().unwrap().next_line()?;
            match line {
                Some(line) => {
                    let (entry, ts) = parse_raw_line(
                        line,
                        &self.type_key,
                        rule,
                        self.current_mtime,
                        self.prev_ts,
                        self.next_id,
                    );
                    self.prev_ts = Some(ts);
                    self.next_id += 1;
                    out.push(entry);
                }
                None => {
                    self.current = None;
                }
            }
        }
        Ok(out)
    }
}

fn file_mtime_ms(path: &Path) -> Option<i64> {
    std::fs::metadata(path)
        .ok()?
        .modified()
        .ok()?
        .duration_since(std::time::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_key_of() {
        assert_eq!(type_key_of(Path::new("foo.log")), "foo");
        assert_eq!(type_key_of(Path::new("foo.log.2")), "foo");
        assert_eq!(type_key_of(Path::new("bar.txt")), "bar");
    }

    #[test]
    fn test_rotation_number_orders_newest_first() {
        let mut files = vec![
            PathBuf::from("foo.log.2"),
            PathBuf::from("foo.log"),
            PathBuf::from("foo.log.1"),
        ];
        files.sort_by_key(|f| rotation_number(f));
        assert_eq!(
            files,
            vec![
                PathBuf::from("foo.log"),
                PathBuf::from("foo.log.1"),
                PathBuf::from("foo.log.2"),
            ]
        );
    }

    #[test]
    fn test_group_by_type() {
        let files = vec![
            PathBuf::from("foo.log"),
            PathBuf::from("bar.log"),
            PathBuf::from("foo.log.1"),
        ];
        let groups = group_by_type(&files);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["foo"].len(), 2);
        assert_eq!(groups["foo"][0], PathBuf::from("foo.log"));
    }

    #[test]
    fn test_stage_type_sorts_descending() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("foo.log");
        std::fs::write(
            &file,
            "2026-01-01 00:00:01 hello\n2026-01-01 00:00:03 world\n2026-01-01 00:00:02 mid\n",
        )
        .unwrap();
        let out_dir = dir.path().join("stage");
        let mut next_id = 0u64;
        let staged = stage_type(
            "foo",
            &[file],
            None,
            &TimezoneSettings::default(),
            &out_dir,
            &mut next_id,
        )
        .unwrap();
        let contents = std::fs::read_to_string(staged).unwrap();
        let entries: Vec<LogEntry> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].ts >= entries[1].ts);
        assert!(entries[1].ts >= entries[2].ts);
    }
}
