//! Serves arbitrary `[start, endExclusive)` physical-index ranges over a
//! manifest's chunks without loading the whole merged stream into memory.

use crate::error::ManifestError;
use crate::manifest::{ManifestWriter, manifest_path};
use crate::model::LogEntry;
use crate::readers::ForwardLineReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct PagedReader {
    dir: PathBuf,
    writer: ManifestWriter,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    pub skip_invalid: bool,
}

impl PagedReader {
    pub fn open(dir: &Path) -> Result<Self, ManifestError> {
        let writer = ManifestWriter::load_or_create(
            dir.to_path_buf(),
            chrono::Utc::now().to_rfc3339(),
        )?;
        Ok(Self {
            dir: dir.to_path_buf(),
            writer,
        })
    }

    pub fn manifest_path(&self) -> PathBuf {
        manifest_path(&self.dir)
    }

    /// The only total guaranteed to correspond to readable data; `totalLines`
    /// (if present) may be a larger, merely informative upper bound.
    pub fn total_lines(&self) -> u64 {
        self.writer.manifest().merged_lines
    }

    /// Reads the half-open physical range `[start, end_excl)`, consolidating
    /// contiguous chunk reads into the minimum number of file opens.
    pub fn read_line_range(
        &self,
        start: u64,
        end_excl: u64,
        opts: ReadOptions,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Vec<LogEntry>, ManifestError> {
        if end_excl <= start {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity((end_excl - start) as usize);
        for chunk in &self.writer.manifest().chunks {
            if let Some(cancel) = cancel {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
            }
            let chunk_start = chunk.start;
            let chunk_end = chunk.start + chunk.lines;
            if chunk_end <= start || chunk_start >= end_excl {
                continue;
            }
            let take_from = start.saturating_sub(chunk_start);
            let take_to_excl = (end_excl - chunk_start).min(chunk.lines);
            let path = self.dir.join(&chunk.file);
            let mut reader =
                ForwardLineReader::open(&path).map_err(|source| ManifestError::ReadError {
                    path: path.clone(),
                    source,
                })?;
            let mut idx = 0u64;
            while idx < take_to_excl {
                let Some(line) = reader
                    .next_line()
                    .map_err(|source| ManifestError::ReadError {
                        path: path.clone(),
                        source,
                    })?
                else {
                    break;
                };
                if idx >= take_from {
                    match serde_json::from_str::<LogEntry>(&line) {
                        Ok(entry) => out.push(entry),
                        Err(source) if opts.skip_invalid => {
                            debug!("skipping invalid line in {}: {source}", path.display());
                        }
                        Err(source) => {
                            return Err(ManifestError::ParseError {
                                path: path.clone(),
                                source,
                            });
                        }
                    }
                }
                idx += 1;
            }
        }
        let need = (end_excl - start) as usize;
        out.truncate(need);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_writer::ChunkWriter;
    use crate::manifest::ManifestWriter as MW;
    use crate::model::LogLevel;

    fn entry(id: u64, ts: i64) -> LogEntry {
        LogEntry {
            id,
            ts,
            level: LogLevel::Info,
            type_key: "foo".into(),
            source: "foo".into(),
            text: Some(format!("line {id}")),
            parsed: None,
        }
    }

    fn build_manifest(dir: &Path, entries: &[LogEntry], chunk_max: usize) {
        let mut cw = ChunkWriter::new(dir.to_path_buf(), chunk_max);
        let mut mw = MW::new(dir.to_path_buf(), "2026-01-01T00:00:00Z".into());
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
    fn test_read_range_spans_multiple_chunks() {
        let dir = tempfile::TempDir::new().unwrap();
        let entries: Vec<_> = (0..10).map(|i| entry(i, 100 - i as i64)).collect();
        build_manifest(dir.path(), &entries, 3);

        let reader = PagedReader::open(dir.path()).unwrap();
        assert_eq!(reader.total_lines(), 10);

        let got = reader
            .read_line_range(2, 7, ReadOptions::default(), None)
            .unwrap();
        assert_eq!(got.len(), 5);
        assert_eq!(got[0].id, 2);
        assert_eq!(got[4].id, 6);
    }

    #[test]
    fn test_read_range_exact_chunk_boundary() {
        let dir = tempfile::TempDir::new().unwrap();
        let entries: Vec<_> = (0..6).map(|i| entry(i, 100 - i as i64)).collect();
        build_manifest(dir.path(), &entries, 3);

        let reader = PagedReader::open(dir.path()).unwrap();
        let got = reader
            .read_line_range(0, 6, ReadOptions::default(), None)
            .unwrap();
        assert_eq!(got.len(), 6);
        assert_eq!(got.iter().map(|e| e.id).collect::<Vec<_>>(), (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_range_returns_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let entries: Vec<_> = (0..3).map(|i| entry(i, 10 - i as i64)).collect();
        build_manifest(dir.path(), &entries, 10);
        let reader = PagedReader::open(dir.path()).unwrap();
        assert!(
            reader
                .read_line_range(5, 5, ReadOptions::default(), None)
                .unwrap()
                .is_empty()
        );
    }
}
