//! Drives one merge session end to end: optional warm-up, per-type staging,
//! the k-way merge, and chunk/manifest finalization, wiring together
//! [`crate::stager`], [`crate::warmup`], [`crate::merger`],
//! [`crate::chunk_writer`], [`crate::manifest`], and [`crate::pagination`].

use crate::chunk_writer::ChunkWriter;
use crate::error::SessionError;
use crate::manifest::ManifestWriter;
use crate::model::LogEntry;
use crate::pagination::PaginationService;
use crate::parser::RuleSet;
use crate::settings::Settings;
use crate::stager;
use crate::warmup::{self, WarmupSource};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Warmup,
    Staging,
    Merging,
    Finalizing,
    Done,
    Canceled,
    Failed,
}

pub struct SessionOptions {
    pub input_dir: PathBuf,
    pub out_dir: PathBuf,
    pub rules: Option<RuleSet>,
    pub run_warmup: bool,
}

#[derive(Debug, Clone)]
pub struct SavedInfo {
    pub out_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub chunk_count: usize,
    pub merged: u64,
    pub total: Option<u64>,
}

/// Callbacks the orchestrator invokes as the session progresses. All are
/// optional; a consumer wires only the ones it cares about.
#[derive(Default)]
pub struct SessionHandlers<'a> {
    pub on_warmup_batch: Option<Box<dyn FnMut(&[LogEntry]) + 'a>>,
    pub on_progress: Option<Box<dyn FnMut(u64, u64, Option<u64>) + 'a>>,
    pub on_batch: Option<Box<dyn FnMut(&[LogEntry]) + 'a>>,
    pub on_saved: Option<Box<dyn FnMut(&SavedInfo) + 'a>>,
}

pub struct SessionOrchestrator {
    settings: Settings,
    state: SessionState,
    pagination: PaginationService,
}

impl SessionOrchestrator {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            state: SessionState::Idle,
            pagination: PaginationService::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pagination(&self) -> &PaginationService {
        &self.pagination
    }

    pub fn pagination_mut(&mut self) -> &mut PaginationService {
        &mut self.pagination
    }

    /// Runs one session to completion, cancellation, or failure. Never
    /// panics on input I/O errors; those surface as `SessionError` and move
    /// the state to `Failed`.
    pub fn start(
        &mut self,
        opts: SessionOptions,
        cancel: Option<&Arc<AtomicBool>>,
        mut handlers: SessionHandlers<'_>,
    ) -> Result<(), SessionError> {
        if !opts.input_dir.is_dir() {
            self.state = SessionState::Failed;
            return Err(SessionError::BadInputDir { path: opts.input_dir });
        }

        let files = stager::list_input_log_files(&opts.input_dir)
            .map_err(|_| SessionError::BadInputDir { path: opts.input_dir.clone() })?;
        let groups = stager::group_by_type(&files);

        if opts.run_warmup {
            self.state = SessionState::Warmup;
            let sources: Vec<WarmupSource> = groups
                .iter()
                .map(|(type_key, files)| WarmupSource {
                    type_key: type_key.clone(),
                    files_newest_first: files.clone(),
                })
                .collect();
            let warm = warmup::run_warmup(
                sources,
                opts.rules.as_ref(),
                &self.settings.warmup,
                &self.settings.timezone,
            )
            .map_err(|_| SessionError::Canceled)?;
            self.pagination.set_warmup_total(warm.len() as u64);
            if let Some(cb) = handlers.on_warmup_batch.as_mut() {
                cb(&warm);
            }
        }

        if is_canceled(cancel) {
            self.state = SessionState::Canceled;
            return Ok(());
        }

        self.state = SessionState::Staging;
        let stage_dir = opts.out_dir.join(".staging");
        let mut next_id = 0u64;
        let mut staging_files = Vec::with_capacity(groups.len());
        let total_files = groups.len().max(1) as u64;
        for (i, (type_key, files_newest_first)) in groups.iter().enumerate() {
            if is_canceled(cancel) {
                self.state = SessionState::Canceled;
                return Ok(());
            }
            let staged = stager::stage_type(
                type_key,
                files_newest_first,
                opts.rules.as_ref(),
                &self.settings.timezone,
                &stage_dir,
                &mut next_id,
            )
            .map_err(|_| SessionError::BadInputDir { path: opts.input_dir.clone() })?;
            staging_files.push((type_key.clone(), staged));
            if let Some(cb) = handlers.on_progress.as_mut() {
                cb(1, i as u64 + 1, Some(total_files));
            }
        }

        if is_canceled(cancel) {
            self.state = SessionState::Canceled;
            return Ok(());
        }

        self.state = SessionState::Merging;
        let mut merger = crate::merger::KWayMerger::new(staging_files, self.settings.engine.batch_size)
            .map_err(|_| SessionError::BadInputDir { path: opts.input_dir.clone() })?;

        std::fs::create_dir_all(&opts.out_dir)
            .map_err(|_| SessionError::BadInputDir { path: opts.out_dir.clone() })?;
        let mut chunk_writer = ChunkWriter::new(opts.out_dir.clone(), self.settings.engine.chunk_max_lines);
        let mut manifest_writer =
            ManifestWriter::load_or_create(opts.out_dir.clone(), chrono::Utc::now().to_rfc3339())
                .map_err(|_| SessionError::BadInputDir { path: opts.out_dir.clone() })?;

        let mut progress_last = Instant::now();
        let progress_min = std::time::Duration::from_millis(self.settings.engine.progress_min_ms);
        let mut done_lines = 0u64;
        let mut write_err: Option<SessionError> = None;

        merger
            .run(cancel, |batch| {
                done_lines += batch.len() as u64;
                if let Some(cb) = handlers.on_batch.as_mut() {
                    cb(batch);
                }
                match chunk_writer.append_batch(batch) {
                    Ok(flushed) => {
                        for chunk in flushed {
                            manifest_writer.add_chunk(chunk);
                        }
                    }
                    Err(e) => {
                        write_err = Some(SessionError::Config(e.to_string()));
                        return;
                    }
                }
                if let Some(cb) = handlers.on_progress.as_mut() {
                    if progress_last.elapsed() >= progress_min {
                        cb(done_lines, done_lines, None);
                        progress_last = Instant::now();
                    }
                }
            })
            .map_err(|_| SessionError::BadInputDir { path: opts.input_dir.clone() })?;

        if let Some(e) = write_err {
            self.state = SessionState::Failed;
            return Err(e);
        }

        if is_canceled(cancel) {
            self.state = SessionState::Canceled;
            return Ok(());
        }

        self.state = SessionState::Finalizing;
        if let Some(flushed) = chunk_writer
            .flush_remainder()
            .map_err(|e| SessionError::Config(e.to_string()))?
        {
            manifest_writer.add_chunk(flushed);
        }
        manifest_writer.set_total(chunk_writer.merged_lines());
        manifest_writer
            .save()
            .map_err(|e| SessionError::Config(e.to_string()))?;

        self.pagination.clear_warmup();
        self.pagination
            .set_manifest_dir(&opts.out_dir)
            .map_err(|e| SessionError::Config(e.to_string()))?;

        let saved = SavedInfo {
            out_dir: opts.out_dir.clone(),
            manifest_path: crate::manifest::manifest_path(&opts.out_dir),
            chunk_count: manifest_writer.manifest().chunk_count,
            merged: manifest_writer.manifest().merged_lines,
            total: manifest_writer.manifest().total_lines,
        };
        if let Some(cb) = handlers.on_saved.as_mut() {
            cb(&saved);
        }

        self.state = SessionState::Done;
        Ok(())
    }
}

fn is_canceled(cancel: Option<&Arc<AtomicBool>>) -> bool {
    cancel.is_some_and(|c| c.load(Ordering::Relaxed))
}

pub fn manifest_dir_exists(dir: &Path) -> bool {
    dir.join(crate::manifest::MANIFEST_FILE).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_log(dir: &Path, name: &str, lines: &[&str]) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
    }

    #[test]
    fn test_scenario_1_end_to_end_session() {
        let input = tempfile::TempDir::new().unwrap();
        let output = tempfile::TempDir::new().unwrap();
        write_log(
            input.path(),
            "a.log",
            &["2026-01-01 00:00:01 a1", "2026-01-01 00:00:02 a2", "2026-01-01 00:00:03 a3"],
        );
        write_log(
            input.path(),
            "b.log",
            &["2026-01-01 00:00:01 b1", "2026-01-01 00:00:02 b2", "2026-01-01 00:00:04 b4"],
        );
        write_log(input.path(), "c.log", &["2026-01-01 00:00:05 c5"]);

        let mut settings = Settings::default();
        settings.engine.chunk_max_lines = 1000;
        settings.engine.batch_size = 100;
        let mut orch = SessionOrchestrator::new(settings);

        let opts = SessionOptions {
            input_dir: input.path().to_path_buf(),
            out_dir: output.path().to_path_buf(),
            rules: None,
            run_warmup: false,
        };
        orch.start(opts, None, SessionHandlers::default()).unwrap();

        assert_eq!(orch.state(), SessionState::Done);
        assert_eq!(orch.pagination().get_file_total(), 7);
        let got = orch.pagination().read_range_by_idx(1, 7, None).unwrap();
        let tss: Vec<i64> = got.iter().map(|e| e.ts).collect();
        assert_eq!(tss, vec![1, 1, 2, 2, 3, 4, 5]);
    }

    #[test]
    fn test_bad_input_dir_fails_without_panicking() {
        let output = tempfile::TempDir::new().unwrap();
        let mut orch = SessionOrchestrator::new(Settings::default());
        let opts = SessionOptions {
            input_dir: PathBuf::from("/nonexistent/does/not/exist"),
            out_dir: output.path().to_path_buf(),
            rules: None,
            run_warmup: false,
        };
        let err = orch.start(opts, None, SessionHandlers::default());
        assert!(err.is_err());
        assert_eq!(orch.state(), SessionState::Failed);
    }

    #[test]
    fn test_cancel_before_start_yields_canceled_state() {
        let input = tempfile::TempDir::new().unwrap();
        let output = tempfile::TempDir::new().unwrap();
        write_log(input.path(), "a.log", &["2026-01-01 00:00:01 a1"]);
        let cancel = Arc::new(AtomicBool::new(true));
        let mut orch = SessionOrchestrator::new(Settings::default());
        let opts = SessionOptions {
            input_dir: input.path().to_path_buf(),
            out_dir: output.path().to_path_buf(),
            rules: None,
            run_warmup: false,
        };
        orch.start(opts, Some(&cancel), SessionHandlers::default()).unwrap();
        assert_eq!(orch.state(), SessionState::Canceled);
    }
}
