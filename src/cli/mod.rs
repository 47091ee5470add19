use crate::Result;
use clap::Parser;

mod manifest;
mod merge;
mod page;
mod search;
mod serve;

#[derive(Debug, clap::Parser)]
#[clap(name = "logweave", version)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    Merge(merge::Merge),
    Page(page::Page),
    Search(search::Search),
    Serve(serve::Serve),
    Manifest(manifest::Manifest),
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let result = match args.command {
        Command::Merge(cmd) => cmd.run().await,
        Command::Page(cmd) => cmd.run().await,
        Command::Search(cmd) => cmd.run().await,
        Command::Serve(cmd) => cmd.run().await,
        Command::Manifest(cmd) => cmd.run().await,
    };
    if let Err(report) = &result {
        eprintln!("{report:?}");
        std::process::exit(exit_code_for(report));
    }
    Ok(())
}

fn exit_code_for(report: &miette::Report) -> i32 {
    if let Some(e) = report.downcast_ref::<crate::error::SessionError>() {
        return match e {
            crate::error::SessionError::Canceled => 4,
            crate::error::SessionError::Config(_) => 2,
            crate::error::SessionError::BadInputDir { .. } => 3,
        };
    }
    3
}
