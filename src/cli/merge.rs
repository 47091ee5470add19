use crate::error::SessionError;
use crate::orchestrator::{SessionHandlers, SessionOptions, SessionOrchestrator};
use crate::parser::{ParserTemplate, RuleSet};
use crate::settings::Settings;
use crate::Result;
use miette::IntoDiagnostic;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Runs one merge session end to end and prints progress to stderr.
#[derive(Debug, clap::Args)]
pub struct Merge {
    /// Directory containing the rotated `*.log`/`*.log.<N>` input files
    input_dir: PathBuf,
    /// Directory the chunk files and manifest are written to
    out_dir: PathBuf,
    /// Path to a parser template JSON file (see the template shape in the docs)
    #[clap(long)]
    rules: Option<PathBuf>,
    /// Skip the warm-up prepass and go straight to staging
    #[clap(long)]
    no_warmup: bool,
}

impl Merge {
    pub async fn run(&self) -> Result<()> {
        let settings = Settings::load()?;
        settings.validate().map_err(miette::Report::from)?;

        let rules = match &self.rules {
            Some(path) => Some(load_rules(path, settings.parser.clone())?),
            None => None,
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_for_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel_for_signal.store(true, Ordering::Relaxed);
            }
        });

        let mut orchestrator = SessionOrchestrator::new(settings);
        let opts = SessionOptions {
            input_dir: self.input_dir.clone(),
            out_dir: self.out_dir.clone(),
            rules,
            run_warmup: !self.no_warmup,
        };

        let handlers = SessionHandlers {
            on_progress: Some(Box::new(|inc, done, total| {
                eprint!("\rmerging: {done}{} lines", total.map(|t| format!("/{t}")).unwrap_or_default());
                let _ = inc;
            })),
            on_saved: Some(Box::new(|saved| {
                eprintln!(
                    "\nsaved {} chunk(s), {} lines, to {}",
                    saved.chunk_count,
                    saved.merged,
                    saved.out_dir.display()
                );
            })),
            ..Default::default()
        };

        orchestrator
            .start(opts, Some(&cancel), handlers)
            .map_err(miette::Report::from)?;

        match orchestrator.state() {
            crate::orchestrator::SessionState::Canceled => {
                Err(SessionError::Canceled.into())
            }
            _ => Ok(()),
        }
    }
}

fn load_rules(path: &std::path::Path, settings: crate::settings::ParserSettings) -> Result<RuleSet> {
    let text = std::fs::read_to_string(path).into_diagnostic()?;
    let template: ParserTemplate = serde_json::from_str(&text).into_diagnostic()?;
    RuleSet::compile(&template, settings).map_err(Into::into)
}
