//! Streams the per-type staging files (each already descending by `ts`)
//! forward and emits a single globally descending sequence via a max-heap
//! with a deterministic, total tie-break order.

use crate::model::{LogEntry, MergeKey};
use crate::readers::ForwardLineReader;
use std::collections::BinaryHeap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SEED_BATCH: usize = 100;

struct TypeCursor {
    type_key: String,
    reader: ForwardLineReader,
    seq: u64,
    pending: std::collections::VecDeque<LogEntry>,
}

impl TypeCursor {
    fn open(type_key: String, path: PathBuf) -> io::Result<Self> {
        Ok(Self {
            type_key,
            reader: ForwardLineReader::open(&path)?,
            seq: 0,
            pending: std::collections::VecDeque::new(),
        })
    }

    fn fill(&mut self, n: usize) -> io::Result<()> {
        for line in self.reader.next_lines(n)? {
            if let Ok(entry) = serde_json::from_str::<LogEntry>(&line) {
                self.pending.push_back(entry);
            }
        }
        Ok(())
    }

    fn pop_next(&mut self) -> io::Result<Option<LogEntry>> {
        if self.pending.is_empty() {
            self.fill(SEED_BATCH)?;
        }
        Ok(self.pending.pop_front())
    }
}

struct HeapItem {
    key: MergeKey,
    entry: LogEntry,
    cursor_idx: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for HeapItem {}
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

/// Drives one k-way merge over a directory of `{typeKey}.jsonl` staging
/// files, calling `on_batch` once per `batch_size` entries collected.
pub struct KWayMerger {
    cursors: Vec<TypeCursor>,
    heap: BinaryHeap<HeapItem>,
    batch_size: usize,
}

impl KWayMerger {
    pub fn new(staging_files: Vec<(String, PathBuf)>, batch_size: usize) -> io::Result<Self> {
        let cursors = staging_files
            .into_iter()
            .map(|(type_key, path)| TypeCursor::open(type_key, path))
            .collect::<io::Result<Vec<_>>>()?;
        Ok(Self {
            cursors,
            heap: BinaryHeap::new(),
            batch_size,
        })
    }

    fn seed(&mut self) -> io::Result<()> {
        for idx in 0..self.cursors.len() {
            self.push_next(idx)?;
        }
        Ok(())
    }

    fn push_next(&mut self, cursor_idx: usize) -> io::Result<()> {
        let cursor = &mut self.cursors[cursor_idx];
        if let Some(entry) = cursor.pop_next()? {
            let seq = cursor.seq;
            cursor.seq += 1;
            let key = MergeKey {
                ts: entry.ts,
                type_key: cursor.type_key.clone(),
                seq,
            };
            self.heap.push(HeapItem {
                key,
                entry,
                cursor_idx,
            });
        }
        Ok(())
    }

    /// Runs the merge to completion (or cancellation), invoking `on_batch`
    /// with each full batch. No partial trailing batch is ever emitted after
    /// cancellation; any remainder at clean completion is flushed as a final
    /// (possibly short) batch.
    pub fn run(
        &mut self,
        cancel: Option<&Arc<AtomicBool>>,
        mut on_batch: impl FnMut(&[LogEntry]),
    ) -> io::Result<u64> {
        self.seed()?;
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut total = 0u64;
        loop {
            if let Some(cancel) = cancel {
                if cancel.load(Ordering::Relaxed) {
                    return Ok(total);
                }
            }
            let Some(top) = self.heap.pop() else {
                break;
            };
            batch.push(top.entry);
            total += 1;
            self.push_next(top.cursor_idx)?;
            if batch.len() >= self.batch_size {
                on_batch(&batch);
                batch.clear();
            }
        }
        if !batch.is_empty() {
            on_batch(&batch);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogLevel;

    fn write_staging(dir: &std::path::Path, type_key: &str, tss: &[i64]) -> PathBuf {
        let path = dir.join(format!("{type_key}.jsonl"));
        let mut contents = String::new();
        for (i, ts) in tss.iter().enumerate() {
            let entry = LogEntry {
                id: (tss.len() - i) as u64,
                ts: *ts,
                level: LogLevel::Info,
                type_key: type_key.to_string(),
                source: type_key.to_string(),
                text: Some(format!("{type_key}-{ts}")),
                parsed: None,
            };
            contents.push_str(&serde_json::to_string(&entry).unwrap());
            contents.push('\n');
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_three_files_merge_descending() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = write_staging(dir.path(), "a", &[3, 2, 1]);
        let b = write_staging(dir.path(), "b", &[4, 2, 1]);
        let c = write_staging(dir.path(), "c", &[5]);

        let mut merger = KWayMerger::new(
            vec![("a".into(), a), ("b".into(), b), ("c".into(), c)],
            100,
        )
        .unwrap();
        let mut out = Vec::new();
        merger.run(None, |batch| out.extend_from_slice(batch)).unwrap();

        let tss: Vec<i64> = out.iter().map(|e| e.ts).collect();
        assert_eq!(tss, vec![5, 4, 3, 2, 2, 1, 1]);
    }

    #[test]
    fn test_batches_emitted_at_batch_size() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = write_staging(dir.path(), "a", &[5, 4, 3, 2, 1]);
        let mut merger = KWayMerger::new(vec![("a".into(), a)], 2).unwrap();
        let mut batch_sizes = Vec::new();
        merger
            .run(None, |batch| batch_sizes.push(batch.len()))
            .unwrap();
        assert_eq!(batch_sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_cancellation_stops_without_partial_batch_emission_race() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = write_staging(dir.path(), "a", &(0..20).rev().collect::<Vec<_>>());
        let mut merger = KWayMerger::new(vec![("a".into(), a)], 1).unwrap();
        let cancel = Arc::new(AtomicBool::new(false));
        let mut count = 0;
        merger
            .run(Some(&cancel), |batch| {
                count += batch.len();
                if count >= 3 {
                    cancel.store(true, Ordering::Relaxed);
                }
            })
            .unwrap();
        assert_eq!(count, 3);
    }
}
