//! Rotates a stream of [`LogEntry`] values into fixed-size, immutable NDJSON
//! chunks, writing each atomically via write-temp-then-rename with bounded
//! retry on transient rename failures.

use crate::error::ChunkWriteError;
use crate::model::LogEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_RENAME_ATTEMPTS: u32 = 10_000;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(10);

static PART_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^part-(\d{6})\.ndjson$").unwrap());

#[derive(Debug, Clone)]
pub struct FlushedChunk {
    pub file: String,
    pub lines: usize,
}

pub struct ChunkWriter {
    out_dir: PathBuf,
    chunk_max_lines: usize,
    current_index: u32,
    initialized: bool,
    buffer: Vec<LogEntry>,
    merged_lines: u64,
}

impl ChunkWriter {
    pub fn new(out_dir: PathBuf, chunk_max_lines: usize) -> Self {
        Self {
            out_dir,
            chunk_max_lines,
            current_index: 0,
            initialized: false,
            buffer: Vec::new(),
            merged_lines: 0,
        }
    }

    pub fn merged_lines(&self) -> u64 {
        self.merged_lines
    }

    /// Appends entries to the buffer, flushing a chunk each time the buffer
    /// reaches `chunk_max_lines`. Returns the chunks flushed during this call.
    pub fn append_batch(
        &mut self,
        entries: &[LogEntry],
    ) -> Result<Vec<FlushedChunk>, ChunkWriteError> {
        let mut flushed = Vec::new();
        for entry in entries {
            self.buffer.push(entry.clone());
            if self.buffer.len() >= self.chunk_max_lines {
                flushed.push(self.flush_chunk()?);
            }
        }
        Ok(flushed)
    }

    /// Flushes a short final chunk if the buffer is non-empty.
    pub fn flush_remainder(&mut self) -> Result<Option<FlushedChunk>, ChunkWriteError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.flush_chunk()?))
    }

    fn flush_chunk(&mut self) -> Result<FlushedChunk, ChunkWriteError> {
        self.ensure_initialized()?;
        let entries = std::mem::take(&mut self.buffer);
        let lines = entries.len();
        let mut ndjson = String::new();
        for entry in &entries {
            ndjson.push_str(&serde_json::to_string(entry).expect("LogEntry always serializes"));
            ndjson.push('\n');
        }
        let file = self.write_with_retry(&ndjson)?;
        self.merged_lines += lines as u64;
        Ok(FlushedChunk { file, lines })
    }

    fn ensure_initialized(&mut self) -> Result<(), ChunkWriteError> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;
        std::fs::create_dir_all(&self.out_dir).map_err(|source| ChunkWriteError::WriteFailed {
            dir: self.out_dir.clone(),
            source,
        })?;
        let mut max_idx = 0u32;
        if let Ok(rd) = std::fs::read_dir(&self.out_dir) {
            for entry in rd.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Some(caps) = PART_NAME_RE.captures(name) {
                        if let Ok(n) = caps[1].parse::<u32>() {
                            max_idx = max_idx.max(n);
                        }
                    }
                }
            }
        }
        self.current_index = max_idx;
        Ok(())
    }

    fn write_with_retry(&mut self, contents: &str) -> Result<String, ChunkWriteError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if attempts > MAX_RENAME_ATTEMPTS {
                return Err(ChunkWriteError::ExhaustedAttempts {
                    dir: self.out_dir.clone(),
                    attempts: MAX_RENAME_ATTEMPTS,
                });
            }

            let tmp_name = format!(".tmp-{}-{}", std::process::id(), uuid::Uuid::new_v4());
            let tmp_path = self.out_dir.join(&tmp_name);
            if let Err(e) = std::fs::write(&tmp_path, contents) {
                if e.kind() == io::ErrorKind::NotFound {
                    let _ = std::fs::create_dir_all(&self.out_dir);
                    continue;
                }
                return Err(ChunkWriteError::WriteFailed {
                    dir: self.out_dir.clone(),
                    source: e,
                });
            }

            self.current_index += 1;
            let target_name = format!("part-{:06}.ndjson", self.current_index);
            let target_path = self.out_dir.join(&target_name);

            if target_path.exists() {
                let _ = std::fs::remove_file(&tmp_path);
                continue;
            }

            match std::fs::rename(&tmp_path, &target_path) {
                Ok(()) => return Ok(target_name),
                Err(e) => match e.kind() {
                    io::ErrorKind::AlreadyExists => continue,
                    io::ErrorKind::NotFound => {
                        let _ = std::fs::create_dir_all(&self.out_dir);
                        continue;
                    }
                    io::ErrorKind::PermissionDenied | io::ErrorKind::ResourceBusy => {
                        std::thread::sleep(LOCK_RETRY_DELAY);
                        continue;
                    }
                    _ => {
                        let _ = std::fs::remove_file(&tmp_path);
                        return Err(ChunkWriteError::WriteFailed {
                            dir: self.out_dir.clone(),
                            source: e,
                        });
                    }
                },
            }
        }
    }
}

pub fn part_path(dir: &Path, file: &str) -> PathBuf {
    dir.join(file)
}
