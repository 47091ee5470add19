//! Lays a logical, ascending, 1-based index over the physically descending
//! chunk storage, with an optional filter and a forward-scanning search.
//!
//! Every response carries the `version` counter so a consumer can discard a
//! result computed against a manifest or filter that has since changed.

use crate::error::ManifestError;
use crate::filter::{Filter, SearchQuery};
use crate::model::LogEntry;
use crate::paged_reader::{PagedReader, ReadOptions};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SEARCH_SCAN_BATCH: u64 = 1_000;

/// A single search hit: `idx` is logical, ascending, 1-based.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub idx: u64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub range: Option<(u64, u64)>,
    pub top: Option<usize>,
}

pub struct PaginationService {
    dir: Option<PathBuf>,
    reader: Option<PagedReader>,
    filter: Option<Filter>,
    filtered_index: Option<Vec<u64>>,
    version: u64,
    warmup_active: bool,
    warmup_total: u64,
}

impl Default for PaginationService {
    fn default() -> Self {
        Self::new()
    }
}

impl PaginationService {
    pub fn new() -> Self {
        Self {
            dir: None,
            reader: None,
            filter: None,
            filtered_index: None,
            version: 0,
            warmup_active: false,
            warmup_total: 0,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get_manifest_dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn is_warmup_active(&self) -> bool {
        self.warmup_active
    }

    pub fn get_warm_total(&self) -> u64 {
        self.warmup_total
    }

    /// Replaces the warm-up total shown to consumers before the merge
    /// directory exists; bumps `version`.
    pub fn set_warmup_total(&mut self, total: u64) {
        self.warmup_active = true;
        self.warmup_total = total;
        self.version += 1;
    }

    pub fn clear_warmup(&mut self) {
        self.warmup_active = false;
        self.warmup_total = 0;
        self.version += 1;
    }

    /// Opens (or reopens) the manifest at `dir`, clearing any active filter.
    pub fn set_manifest_dir(&mut self, dir: &Path) -> Result<(), ManifestError> {
        let reader = PagedReader::open(dir)?;
        self.dir = Some(dir.to_path_buf());
        self.reader = Some(reader);
        self.filter = None;
        self.filtered_index = None;
        self.version += 1;
        Ok(())
    }

    pub fn get_file_total(&self) -> u64 {
        self.reader.as_ref().map(|r| r.total_lines()).unwrap_or(0)
    }

    pub fn get_filtered_total(&self) -> u64 {
        match &self.filtered_index {
            Some(idx) => idx.len() as u64,
            None => self.get_file_total(),
        }
    }

    /// `None` clears the filter; `Some` rebuilds `filteredIndex` by a single
    /// full scan of the manifest in physical (descending-ts) order.
    pub fn set_filter(&mut self, filter: Option<Filter>) -> Result<(), ManifestError> {
        let Some(reader) = &self.reader else {
            self.filter = filter;
            self.filtered_index = None;
            self.version += 1;
            return Ok(());
        };
        match &filter {
            None => {
                self.filtered_index = None;
            }
            Some(f) => {
                let total = reader.total_lines();
                let mut idx = Vec::new();
                let mut pos = 0u64;
                while pos < total {
                    let end = (pos + SEARCH_SCAN_BATCH).min(total);
                    let entries = reader.read_line_range(pos, end, ReadOptions::default(), None)?;
                    for (offset, entry) in entries.iter().enumerate() {
                        if f.matches(entry) {
                            idx.push(pos + offset as u64);
                        }
                    }
                    pos = end;
                }
                self.filtered_index = Some(idx);
            }
        }
        self.filter = filter;
        self.version += 1;
        Ok(())
    }

    fn physical_index_for(&self, idx: u64) -> Option<u64> {
        match &self.filtered_index {
            Some(fi) => {
                let total = fi.len() as u64;
                if idx == 0 || idx > total {
                    return None;
                }
                fi.get((total - idx) as usize).copied()
            }
            None => {
                let total = self.get_file_total();
                if idx == 0 || idx > total {
                    return None;
                }
                Some(total - idx)
            }
        }
    }

    /// `start_idx`/`end_idx` are logical, 1-based, ascending, inclusive.
    /// Returns entries in ascending-ts order with `idx` == `start_idx + k`.
    pub fn read_range_by_idx(
        &self,
        start_idx: u64,
        end_idx: u64,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Vec<LogEntry>, ManifestError> {
        let Some(reader) = &self.reader else {
            return Ok(Vec::new());
        };
        if end_idx < start_idx {
            return Ok(Vec::new());
        }
        let physical: Vec<u64> = (start_idx..=end_idx)
            .filter_map(|idx| self.physical_index_for(idx))
            .collect();
        if physical.is_empty() {
            return Ok(Vec::new());
        }

        let mut sorted_unique = physical.clone();
        sorted_unique.sort_unstable();
        sorted_unique.dedup();

        let mut by_physical: HashMap<u64, LogEntry> = HashMap::with_capacity(physical.len());
        let mut run_start = sorted_unique[0];
        let mut run_prev = sorted_unique[0];
        let flush_run = |lo: u64, hi_excl: u64, map: &mut HashMap<u64, LogEntry>| -> Result<(), ManifestError> {
            let entries = reader.read_line_range(lo, hi_excl, ReadOptions::default(), cancel)?;
            for (offset, entry) in entries.into_iter().enumerate() {
                map.insert(lo + offset as u64, entry);
            }
            Ok(())
        };
        for &p in &sorted_unique[1..] {
            if p == run_prev + 1 {
                run_prev = p;
                continue;
            }
            flush_run(run_start, run_prev + 1, &mut by_physical)?;
            run_start = p;
            run_prev = p;
        }
        flush_run(run_start, run_prev + 1, &mut by_physical)?;

        Ok(physical.into_iter().filter_map(|p| by_physical.remove(&p)).collect())
    }

    /// A single forward pass honoring an optional logical range and a
    /// top-N cap; stops promptly when `cancel` is set.
    pub fn search_all(
        &self,
        query: &SearchQuery,
        opts: SearchOptions,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Vec<SearchHit>, ManifestError> {
        let total = self.get_filtered_total();
        let (start, end) = opts.range.unwrap_or((1, total));
        let end = end.min(total);
        if total == 0 || end < start {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        let mut idx = start;
        'scan: while idx <= end {
            if let Some(cancel) = cancel {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
            }
            let batch_end = (idx + SEARCH_SCAN_BATCH - 1).min(end);
            let entries = self.read_range_by_idx(idx, batch_end, cancel)?;
            for (offset, entry) in entries.iter().enumerate() {
                let text = entry.message();
                if query.matches_text(text) {
                    hits.push(SearchHit {
                        idx: idx + offset as u64,
                        text: text.to_string(),
                    });
                    if let Some(top) = opts.top {
                        if hits.len() >= top {
                            break 'scan;
                        }
                    }
                }
            }
            idx = batch_end + 1;
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_writer::ChunkWriter;
    use crate::manifest::ManifestWriter;
    use crate::model::LogLevel;

    fn entry(id: u64, ts: i64, level: LogLevel) -> LogEntry {
        LogEntry {
            id,
            ts,
            level,
            type_key: "foo".into(),
            source: "foo".into(),
            text: Some(format!("line {id} level={level}")),
            parsed: None,
        }
    }

    fn build(dir: &Path, entries: &[LogEntry], chunk_max: usize) {
        let mut cw = ChunkWriter::new(dir.to_path_buf(), chunk_max);
        let mut mw = ManifestWriter::new(dir.to_path_buf(), "2026-01-01T00:00:00Z".into());
        for flushed in cw.append_batch(entries).unwrap() {
            mw.add_chunk(flushed);
        }
        if let Some(flushed) = cw.flush_remainder().unwrap() {
            mw.add_chunk(flushed);
        }
        mw.set_total(entries.len() as u64);
        mw.save().unwrap();
    }

    #[test]
    fn test_scenario_1_read_range_by_idx_ascending() {
        let dir = tempfile::TempDir::new().unwrap();
        let tss = [5i64, 4, 3, 2, 2, 1, 1];
        let entries: Vec<_> = tss
            .iter()
            .enumerate()
            .map(|(i, ts)| entry(i as u64, *ts, LogLevel::Info))
            .collect();
        build(dir.path(), &entries, 1000);

        let mut svc = PaginationService::new();
        svc.set_manifest_dir(dir.path()).unwrap();
        assert_eq!(svc.get_file_total(), 7);

        let got = svc.read_range_by_idx(1, 7, None).unwrap();
        let got_ts: Vec<i64> = got.iter().map(|e| e.ts).collect();
        assert_eq!(got_ts, vec![1, 1, 2, 2, 3, 4, 5]);
    }

    #[test]
    fn test_scenario_2_rotation_two_reads() {
        let dir = tempfile::TempDir::new().unwrap();
        let tss = [11i64, 10, 8, 7, 6, 5];
        let entries: Vec<_> = tss
            .iter()
            .enumerate()
            .map(|(i, ts)| entry(i as u64, *ts, LogLevel::Info))
            .collect();
        build(dir.path(), &entries, 1000);

        let mut svc = PaginationService::new();
        svc.set_manifest_dir(dir.path()).unwrap();

        let first = svc.read_range_by_idx(1, 3, None).unwrap();
        assert_eq!(first.iter().map(|e| e.ts).collect::<Vec<_>>(), vec![5, 6, 7]);
        let second = svc.read_range_by_idx(4, 6, None).unwrap();
        assert_eq!(second.iter().map(|e| e.ts).collect::<Vec<_>>(), vec![8, 10, 11]);
    }

    #[test]
    fn test_filter_monotonicity_and_version_bump() {
        let dir = tempfile::TempDir::new().unwrap();
        let entries: Vec<_> = (0..1000)
            .map(|i| {
                let level = if i % 27 == 0 { LogLevel::Error } else { LogLevel::Info };
                entry(i, 1000 - i as i64, level)
            })
            .collect();
        let error_count = entries.iter().filter(|e| e.level == LogLevel::Error).count();
        build(dir.path(), &entries, 1000);

        let mut svc = PaginationService::new();
        svc.set_manifest_dir(dir.path()).unwrap();
        let v0 = svc.version();

        svc.set_filter(Some(Filter {
            levels: Some([LogLevel::Error].into_iter().collect()),
            ..Default::default()
        }))
        .unwrap();
        let v1 = svc.version();
        assert!(v1 > v0);
        assert_eq!(svc.get_filtered_total(), error_count as u64);
        assert!(svc.get_filtered_total() <= svc.get_file_total());

        let all = svc.read_range_by_idx(1, error_count as u64, None).unwrap();
        assert!(all.iter().all(|e| e.level == LogLevel::Error));

        svc.set_filter(None).unwrap();
        assert_eq!(svc.get_filtered_total(), svc.get_file_total());
        assert!(svc.version() > v1);
    }

    #[test]
    fn test_search_all_respects_top_cap() {
        let dir = tempfile::TempDir::new().unwrap();
        let entries: Vec<_> = (0..50)
            .map(|i| {
                let mut e = entry(i, 50 - i as i64, LogLevel::Info);
                e.text = Some(format!("boom {i}"));
                e
            })
            .collect();
        build(dir.path(), &entries, 1000);

        let mut svc = PaginationService::new();
        svc.set_manifest_dir(dir.path()).unwrap();
        let q = SearchQuery::new("boom".to_string(), false, false).unwrap();
        let hits = svc
            .search_all(&q, SearchOptions { range: None, top: Some(5) }, None)
            .unwrap();
        assert_eq!(hits.len(), 5);
    }
}
