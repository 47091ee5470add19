//! Produces a small, immediately-viewable ordered slice of the most recent
//! entries across all producers before the full merge has finished staging.
//!
//! Each type gets a quota (`target / K` plus remainder round-robin), walks
//! its rotated files tail-first via [`crate::stager::TypeTailWalker`],
//! applies its own [`TimezoneCorrector`], and the per-type results are
//! combined with the same descending [`MergeKey`] ordering the full k-way
//! merge uses, then truncated to `target`.

use crate::model::{LogEntry, MergeKey};
use crate::parser::RuleSet;
use crate::settings::{TimezoneSettings, WarmupSettings};
use crate::stager::TypeTailWalker;
use crate::time::TimezoneCorrector;
use std::collections::BinaryHeap;
use std::path::PathBuf;

/// One producer's input to the warmup pass: its rotated files, newest-to-oldest.
pub struct WarmupSource {
    pub type_key: String,
    pub files_newest_first: Vec<PathBuf>,
}

fn allocate_quotas(settings: &WarmupSettings, n_types: usize) -> Vec<usize> {
    if n_types == 0 {
        return Vec::new();
    }
    let base = settings.target / n_types;
    let remainder = settings.target % n_types;
    let mut quotas = vec![base; n_types];
    for q in quotas.iter_mut().take(remainder) {
        *q += 1;
    }
    if let Some(cap) = settings.per_type_cap {
        for q in quotas.iter_mut() {
            *q = (*q).min(cap);
        }
    }
    quotas
}

/// Collects up to `n` more entries from whichever walkers still have room
/// and aren't exhausted, round-robin, to make up a deficit left by types
/// that ran out before using their full quota.
fn redistribute_deficit(
    walkers: &mut [TypeTailWalker],
    collected: &mut [Vec<LogEntry>],
    mut deficit: usize,
) {
    if deficit == 0 {
        return;
    }
    loop {
        let mut made_progress = false;
        for (walker, bucket) in walkers.iter_mut().zip(collected.iter_mut()) {
            if deficit == 0 {
                return;
            }
            if walker.exhausted() {
                continue;
            }
            match walker.next_n(1) {
                Ok(mut batch) if !batch.is_empty() => {
                    bucket.append(&mut batch);
                    deficit -= 1;
                    made_progress = true;
                }
                _ => continue,
            }
        }
        if !made_progress {
            return;
        }
    }
}

/// Runs the warmup prepass, returning at most `settings.target` entries in
/// strict descending-ts order (same tie-break as the full merge).
pub fn run_warmup(
    sources: Vec<WarmupSource>,
    rules: Option<&RuleSet>,
    warmup_settings: &WarmupSettings,
    tz_settings: &TimezoneSettings,
) -> std::io::Result<Vec<LogEntry>> {
    let n_types = sources.len();
    let quotas = allocate_quotas(warmup_settings, n_types);

    let mut walkers: Vec<TypeTailWalker> = sources
        .into_iter()
        .map(|s| TypeTailWalker::new(s.type_key, s.files_newest_first, rules))
        .collect();

    let mut collected: Vec<Vec<LogEntry>> = Vec::with_capacity(n_types);
    let mut deficit = 0usize;
    for (walker, quota) in walkers.iter_mut().zip(quotas.iter()) {
        let batch = walker.next_n(*quota)?;
        deficit += quota - batch.len();
        collected.push(batch);
    }

    redistribute_deficit(&mut walkers, &mut collected, deficit);

    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
    for (type_idx, bucket) in collected.into_iter().enumerate() {
        let mut tzc = TimezoneCorrector::new(tz_settings);
        let mut adjusted = Vec::with_capacity(bucket.len());
        for (idx, mut entry) in bucket.into_iter().enumerate() {
            let ts = tzc.adjust(entry.ts, idx);
            for seg in tzc.drain_retro_segments() {
                for e in adjusted.iter_mut().take(seg.end + 1).skip(seg.start) {
                    let e: &mut LogEntry = e;
                    e.ts += seg.delta;
                }
            }
            entry.ts = ts;
            adjusted.push(entry);
        }
        tzc.finalize_suspected();
        adjusted.sort_by(|a, b| b.ts.cmp(&a.ts));
        for (seq, entry) in adjusted.into_iter().enumerate() {
            let key = MergeKey {
                ts: entry.ts,
                type_key: entry.type_key.clone(),
                seq: (type_idx as u64) << 32 | seq as u64,
            };
            heap.push(HeapEntry { key, entry });
        }
    }

    let mut out = Vec::with_capacity(warmup_settings.target.min(heap.len()));
    while out.len() < warmup_settings.target {
        let Some(top) = heap.pop() else { break };
        out.push(top.entry);
    }
    Ok(out)
}

struct HeapEntry {
    key: MergeKey,
    entry: LogEntry,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}
