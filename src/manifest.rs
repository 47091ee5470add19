//! On-disk manifest mapping merged chunks to their offsets, and the writer
//! that maintains it as [`crate::chunk_writer::ChunkWriter`] flushes chunks.

use crate::chunk_writer::FlushedChunk;
use crate::error::ManifestError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub file: String,
    pub lines: u64,
    pub start: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "totalLines", skip_serializing_if = "Option::is_none")]
    pub total_lines: Option<u64>,
    #[serde(rename = "mergedLines")]
    pub merged_lines: u64,
    #[serde(rename = "chunkCount")]
    pub chunk_count: usize,
    pub chunks: Vec<ChunkMeta>,
}

impl Manifest {
    pub fn empty(created_at: String) -> Self {
        Self {
            version: 1,
            created_at,
            total_lines: None,
            merged_lines: 0,
            chunk_count: 0,
            chunks: Vec::new(),
        }
    }

    /// Recomputes `mergedLines` from the chunk list and corrects it in
    /// memory if the persisted value disagrees. The persisted file itself is
    /// left untouched; callers should log a warning when this fires.
    pub fn reconcile(&mut self) -> bool {
        let recomputed: u64 = self.chunks.iter().map(|c| c.lines).sum();
        let disagreed = recomputed != self.merged_lines;
        self.merged_lines = recomputed;
        self.chunk_count = self.chunks.len();
        disagreed
    }

    pub fn validate_offsets(&self) -> Result<(), ManifestError> {
        let mut expected = 0u64;
        for (i, chunk) in self.chunks.iter().enumerate() {
            if chunk.start != expected {
                return Err(ManifestError::BadChunkOffsets {
                    index: i,
                    found: chunk.start,
                    expected,
                });
            }
            expected += chunk.lines;
        }
        Ok(())
    }
}

pub struct ManifestWriter {
    dir: PathBuf,
    manifest: Manifest,
}

impl ManifestWriter {
    pub fn new(dir: PathBuf, created_at: String) -> Self {
        Self {
            dir,
            manifest: Manifest::empty(created_at),
        }
    }

    pub fn load_or_create(dir: PathBuf, created_at: String) -> Result<Self, ManifestError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(Self::new(dir, created_at));
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ManifestError::ReadError {
            path: path.clone(),
            source,
        })?;
        let mut manifest: Manifest =
            serde_json::from_str(&text).map_err(|source| ManifestError::ParseError {
                path: path.clone(),
                source,
            })?;
        manifest.chunks.sort_by_key(|c| c.start);
        if manifest.reconcile() {
            warn!(
                "manifest at {} disagreed with its own chunk offsets; corrected mergedLines in memory",
                path.display()
            );
        }
        Ok(Self { dir, manifest })
    }

    pub fn add_chunk(&mut self, chunk: FlushedChunk) {
        let start = self.manifest.merged_lines;
        self.manifest.chunks.push(ChunkMeta {
            file: chunk.file,
            lines: chunk.lines as u64,
            start,
        });
        self.manifest.merged_lines += chunk.lines as u64;
        self.manifest.chunk_count = self.manifest.chunks.len();
    }

    pub fn set_total(&mut self, total: u64) {
        self.manifest.total_lines = Some(total);
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn save(&self) -> Result<(), ManifestError> {
        let path = self.dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&self.manifest).expect("Manifest always serializes");
        let tmp_path = self.dir.join(format!(".manifest-{}.tmp", uuid::Uuid::new_v4()));
        std::fs::write(&tmp_path, &json).map_err(|source| ManifestError::WriteError {
            path: path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &path).map_err(|source| ManifestError::WriteError {
            path: path.clone(),
            source,
        })
    }
}

pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_chunk_tracks_start_offsets() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut w = ManifestWriter::new(dir.path().to_path_buf(), "2026-01-01T00:00:00Z".into());
        w.add_chunk(FlushedChunk {
            file: "part-000001.ndjson".into(),
            lines: 3,
        });
        w.add_chunk(FlushedChunk {
            file: "part-000002.ndjson".into(),
            lines: 2,
        });
        assert_eq!(w.manifest().chunks[0].start, 0);
        assert_eq!(w.manifest().chunks[1].start, 3);
        assert_eq!(w.manifest().merged_lines, 5);
        assert!(w.manifest().validate_offsets().is_ok());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut w = ManifestWriter::new(dir.path().to_path_buf(), "2026-01-01T00:00:00Z".into());
        w.add_chunk(FlushedChunk {
            file: "part-000001.ndjson".into(),
            lines: 4,
        });
        w.set_total(10);
        w.save().unwrap();

        let loaded = ManifestWriter::load_or_create(dir.path().to_path_buf(), "ignored".into())
            .unwrap();
        assert_eq!(loaded.manifest().merged_lines, 4);
        assert_eq!(loaded.manifest().total_lines, Some(10));
    }

    #[test]
    fn test_reconcile_corrects_disagreement() {
        let mut m = Manifest {
            version: 1,
            created_at: "x".into(),
            total_lines: None,
            merged_lines: 99,
            chunk_count: 1,
            chunks: vec![ChunkMeta {
                file: "part-000001.ndjson".into(),
                lines: 5,
                start: 0,
            }],
        };
        assert!(m.reconcile());
        assert_eq!(m.merged_lines, 5);
    }

    #[test]
    fn test_validate_offsets_rejects_gap() {
        let m = Manifest {
            version: 1,
            created_at: "x".into(),
            total_lines: None,
            merged_lines: 10,
            chunk_count: 2,
            chunks: vec![
                ChunkMeta {
                    file: "a".into(),
                    lines: 5,
                    start: 0,
                },
                ChunkMeta {
                    file: "b".into(),
                    lines: 5,
                    start: 6,
                },
            ],
        };
        assert!(m.validate_offsets().is_err());
    }
}
