use crate::filter::Filter;
use crate::model::LogLevel;
use crate::pagination::PaginationService;
use crate::Result;
use std::collections::HashSet;
use std::path::PathBuf;

/// Prints a logical, 1-based, ascending range of lines from an existing
/// manifest directory.
#[derive(Debug, clap::Args)]
pub struct Page {
    /// Directory containing a `manifest.json`
    dir: PathBuf,
    /// First logical index, 1-based inclusive
    start: u64,
    /// Last logical index, 1-based inclusive
    end: u64,
    /// Only show entries at or above this level (Debug < Info < Warn < Error)
    #[clap(long, value_enum)]
    level: Option<CliLevel>,
    /// Only show entries whose type matches
    #[clap(long)]
    r#type: Option<String>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<CliLevel> for LogLevel {
    fn from(l: CliLevel) -> Self {
        match l {
            CliLevel::Debug => LogLevel::Debug,
            CliLevel::Info => LogLevel::Info,
            CliLevel::Warn => LogLevel::Warn,
            CliLevel::Error => LogLevel::Error,
        }
    }
}

const ALL_LEVELS: [LogLevel; 4] = [
    LogLevel::Debug,
    LogLevel::Info,
    LogLevel::Warn,
    LogLevel::Error,
];

/// Every level ranking at or above `min` (levels are ordered
/// Debug < Info < Warn < Error), matching the `--level` flag's documented
/// "at or above" contract.
fn levels_at_or_above(min: CliLevel) -> HashSet<LogLevel> {
    let min: LogLevel = min.into();
    ALL_LEVELS.into_iter().filter(|l| *l >= min).collect()
}

impl Page {
    pub async fn run(&self) -> Result<()> {
        let mut svc = PaginationService::new();
        svc.set_manifest_dir(&self.dir)?;

        if self.level.is_some() || self.r#type.is_some() {
            let filter = Filter {
                levels: self.level.map(levels_at_or_above),
                types: self.r#type.clone().map(|t| HashSet::from([t])),
                ..Default::default()
            };
            svc.set_filter(Some(filter))?;
        }

        let logs = svc.read_range_by_idx(self.start, self.end, None)?;
        for (offset, entry) in logs.iter().enumerate() {
            println!(
                "{idx}\t{ts}\t{level}\t{type_key}\t{message}",
                idx = self.start + offset as u64,
                ts = entry.ts,
                level = entry.level,
                type_key = entry.type_key,
                message = entry.message(),
            );
        }
        Ok(())
    }
}
