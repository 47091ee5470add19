use crate::filter::SearchQuery;
use crate::pagination::{PaginationService, SearchOptions};
use crate::Result;
use std::path::PathBuf;

/// Runs a forward scan for `query` against an existing manifest directory.
#[derive(Debug, clap::Args)]
pub struct Search {
    /// Directory containing a `manifest.json`
    dir: PathBuf,
    /// Text (or, with --regex, pattern) to search message text for
    query: String,
    /// Treat `query` as a regular expression
    #[clap(long)]
    regex: bool,
    /// Match case exactly
    #[clap(long)]
    case_sensitive: bool,
    /// Stop after this many hits
    #[clap(long)]
    top: Option<usize>,
    /// Restrict the scan to a logical `start:end` range
    #[clap(long, value_parser = parse_range)]
    range: Option<(u64, u64)>,
}

fn parse_range(s: &str) -> std::result::Result<(u64, u64), String> {
    let (lo, hi) = s
        .split_once(':')
        .ok_or_else(|| "expected start:end".to_string())?;
    let lo: u64 = lo.parse().map_err(|_| "bad start".to_string())?;
    let hi: u64 = hi.parse().map_err(|_| "bad end".to_string())?;
    Ok((lo, hi))
}

impl Search {
    pub async fn run(&self) -> Result<()> {
        let mut svc = PaginationService::new();
        svc.set_manifest_dir(&self.dir)?;

        let query = SearchQuery::new(self.query.clone(), self.regex, self.case_sensitive)
            .map_err(|e| miette::miette!("invalid search query: {e}"))?;
        let hits = svc.search_all(
            &query,
            SearchOptions {
                range: self.range,
                top: self.top,
            },
            None,
        )?;
        for hit in &hits {
            println!("{}\t{}", hit.idx, hit.text);
        }
        eprintln!("{} hit(s)", hits.len());
        Ok(())
    }
}
