use crate::manifest::{manifest_path, Manifest as ManifestFile};
use crate::Result;
use comfy_table::Table;
use miette::IntoDiagnostic;
use std::path::PathBuf;

/// Prints a summary table of an existing manifest's chunks.
#[derive(Debug, clap::Args)]
pub struct Manifest {
    /// Directory containing a `manifest.json`
    dir: PathBuf,
}

impl Manifest {
    pub async fn run(&self) -> Result<()> {
        let path = manifest_path(&self.dir);
        let text = std::fs::read_to_string(&path).into_diagnostic()?;
        let manifest: ManifestFile = serde_json::from_str(&text).into_diagnostic()?;
        print_summary(&manifest);
        Ok(())
    }
}

fn print_summary(manifest: &ManifestFile) {
    let mut table = Table::new();
    table.set_header(vec!["file", "lines", "start"]);
    for chunk in &manifest.chunks {
        table.add_row(vec![
            chunk.file.clone(),
            chunk.lines.to_string(),
            chunk.start.to_string(),
        ]);
    }
    for line in table.to_string().lines() {
        println!("{}", line.trim_end());
    }
    println!();
    println!("version: {}", manifest.version);
    println!("created: {}", manifest.created_at);
    println!("chunks:  {}", manifest.chunk_count);
    println!("merged:  {}", manifest.merged_lines);
    if let Some(total) = manifest.total_lines {
        println!("total:   {total}");
    }
}
