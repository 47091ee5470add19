use crate::ipc::server::IpcServer;
use crate::pagination::PaginationService;
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Starts the local-socket IPC server, optionally preloaded against an
/// existing manifest directory, and serves requests until interrupted.
#[derive(Debug, clap::Args)]
pub struct Serve {
    /// Manifest directory to open immediately
    dir: Option<PathBuf>,
}

impl Serve {
    pub async fn run(&self) -> Result<()> {
        let mut pagination = PaginationService::new();
        if let Some(dir) = &self.dir {
            pagination.set_manifest_dir(dir)?;
        }
        let pagination = Arc::new(Mutex::new(pagination));
        let server = IpcServer::new(pagination);
        info!("logweave serve: waiting for connections, ctrl-c to stop");
        tokio::select! {
            result = server.run() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                Ok(())
            }
        }
    }
}
