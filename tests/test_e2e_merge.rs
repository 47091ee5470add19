use logweave::orchestrator::{
    SessionHandlers, SessionOptions, SessionOrchestrator, SessionState,
};
use logweave::settings::Settings;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

fn write_log(dir: &Path, name: &str, lines: &[&str]) {
    let mut f = std::fs::File::create(dir.join(name)).unwrap();
    for line in lines {
        writeln!(f, "{line}").unwrap();
    }
}

/// Spec scenario 1: three files, no rotation, no jumps.
#[test]
fn test_three_files_merge_to_one_chunk() {
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

    let mut batches: Vec<i64> = Vec::new();
    let handlers = SessionHandlers {
        on_batch: Some(Box::new(|batch| {
            batches.extend(batch.iter().map(|e| e.ts));
        })),
        ..Default::default()
    };

    orch.start(
        SessionOptions {
            input_dir: input.path().to_path_buf(),
            out_dir: output.path().to_path_buf(),
            rules: None,
            run_warmup: false,
        },
        None,
        handlers,
    )
    .unwrap();

    assert_eq!(orch.state(), SessionState::Done);
    assert_eq!(batches, vec![5, 4, 3, 2, 2, 1, 1]);

    let manifest_text = std::fs::read_to_string(output.path().join("manifest.json")).unwrap();
    let manifest: logweave::manifest::Manifest = serde_json::from_str(&manifest_text).unwrap();
    assert_eq!(manifest.merged_lines, 7);
    assert_eq!(manifest.chunk_count, 1);

    let got = orch.pagination().read_range_by_idx(1, 7, None).unwrap();
    assert_eq!(got.iter().map(|e| e.ts).collect::<Vec<_>>(), vec![1, 1, 2, 2, 3, 4, 5]);
}

/// Spec scenario 4: cancellation mid-merge delivers exactly the batches
/// seen before the cancel flag flips, and never finalizes a manifest.
#[test]
fn test_cancel_mid_merge_stops_after_observed_batches() {
    let input = tempfile::TempDir::new().unwrap();
    let output = tempfile::TempDir::new().unwrap();

    for t in 0..5 {
        let lines: Vec<String> = (0..2000)
            .map(|i| format!("2026-01-01 00:00:{:02} type{t} line {i}", i % 60))
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        write_log(input.path(), &format!("type{t}.log"), &refs);
    }

    let mut settings = Settings::default();
    settings.engine.batch_size = 1;
    let mut orch = SessionOrchestrator::new(settings);

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_for_batch = cancel.clone();
    let delivered = Arc::new(AtomicU32::new(0));
    let delivered_for_batch = delivered.clone();

    let handlers = SessionHandlers {
        on_batch: Some(Box::new(move |batch| {
            delivered_for_batch.fetch_add(batch.len() as u32, Ordering::Relaxed);
            if delivered_for_batch.load(Ordering::Relaxed) == 3 {
                cancel_for_batch.store(true, Ordering::Relaxed);
            }
        })),
        ..Default::default()
    };

    orch.start(
        SessionOptions {
            input_dir: input.path().to_path_buf(),
            out_dir: output.path().to_path_buf(),
            rules: None,
            run_warmup: false,
        },
        Some(&cancel),
        handlers,
    )
    .unwrap();

    assert_eq!(orch.state(), SessionState::Canceled);
    assert_eq!(delivered.load(Ordering::Relaxed), 3);
    assert!(!output.path().join("manifest.json").exists());
}
