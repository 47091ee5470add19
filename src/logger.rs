//! Dual-sink logger: colored lines on stderr, plain lines appended to a log file.
//!
//! Mirrors the env-driven level knobs in [`crate::env`] (`LOGWEAVE_LOG`,
//! `LOGWEAVE_LOG_FILE_LEVEL`) rather than relying on `RUST_LOG`.

use console::style;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

struct Logger {
    console_level: LevelFilter,
    file_level: LevelFilter,
    file: Option<Mutex<std::fs::File>>,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.console_level || metadata.level() <= self.file_level
    }

    fn log(&self, record: &Record) {
        if record.level() <= self.console_level {
            eprintln!("{}", format_console(record));
        }
        if record.level() <= self.file_level {
            if let Some(file) = &self.file {
                if let Ok(mut file) = file.lock() {
                    let _ = writeln!(file, "{}", format_plain(record));
                }
            }
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

fn format_console(record: &Record) -> String {
    let level = match record.level() {
        Level::Error => style("ERROR").red().bold().to_string(),
        Level::Warn => style("WARN ").yellow().bold().to_string(),
        Level::Info => style("INFO ").green().to_string(),
        Level::Debug => style("DEBUG").blue().to_string(),
        Level::Trace => style("TRACE").dim().to_string(),
    };
    format!("{level} {}", record.args())
}

fn format_plain(record: &Record) -> String {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    format!("{now} {:<5} {}", record.level(), record.args())
}

/// Initialize the global logger from environment-controlled levels.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init() {
    let console_level = *crate::env::LOGWEAVE_LOG;
    let file_level = *crate::env::LOGWEAVE_LOG_FILE_LEVEL;
    let max_level = console_level.max(file_level);

    let file = match std::fs::create_dir_all(&*crate::env::LOGWEAVE_LOGS_DIR) {
        Ok(()) => OpenOptions::new()
            .create(true)
            .append(true)
            .open(&*crate::env::LOGWEAVE_LOG_FILE)
            .ok()
            .map(Mutex::new),
        Err(_) => None,
    };

    let logger = Logger {
        console_level,
        file_level,
        file,
    };

    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(max_level);
    }
}
