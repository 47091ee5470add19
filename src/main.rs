#[macro_use]
extern crate log;

mod chunk_writer;
mod cli;
mod contract;
mod env;
mod error;
mod filter;
mod ipc;
mod logger;
mod manifest;
mod merger;
mod model;
mod orchestrator;
mod paged_reader;
mod pagination;
mod parser;
mod readers;
mod settings;
mod stager;
mod time;
mod warmup;

pub use miette::Result;
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::SignalKind;

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();
    #[cfg(unix)]
    handle_epipe();
    cli::run().await
}

#[cfg(unix)]
fn handle_epipe() {
    match signal::unix::signal(SignalKind::pipe()) {
        Ok(mut pipe_stream) => {
            tokio::spawn(async move {
                pipe_stream.recv().await;
                debug!("received SIGPIPE");
            });
        }
        Err(e) => {
            warn!("Could not set up SIGPIPE handler: {e}");
        }
    }
}
