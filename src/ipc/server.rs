//! Accepts connections on the local socket and answers each request
//! against a shared [`PaginationService`], one request/response pair per
//! read, closing when the peer disconnects.

use crate::contract::{Request, Response};
use crate::env;
use crate::filter::SearchQuery;
use crate::ipc::{deserialize_request, serialize, sock_name};
use crate::pagination::{PaginationService, SearchOptions};
use crate::Result;
use interprocess::local_socket::ListenerOptions;
use interprocess::local_socket::tokio::{RecvHalf, SendHalf};
use interprocess::local_socket::traits::tokio::Listener;
use interprocess::local_socket::traits::tokio::Stream;
use miette::IntoDiagnostic;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

pub struct IpcServer {
    pagination: Arc<Mutex<PaginationService>>,
}

impl IpcServer {
    pub fn new(pagination: Arc<Mutex<PaginationService>>) -> Self {
        Self { pagination }
    }

    pub async fn run(self) -> Result<()> {
        std::fs::create_dir_all(&*env::IPC_SOCK_DIR).into_diagnostic()?;
        let _ = std::fs::remove_file(&*env::IPC_SOCK_MAIN);
        let opts = ListenerOptions::new().name(sock_name("main")?);
        info!("listening on {}", env::IPC_SOCK_MAIN.display());

        #[cfg(unix)]
        let old_umask = unsafe { libc::umask(0o077) };
        let listener = opts.create_tokio();
        #[cfg(unix)]
        unsafe {
            libc::umask(old_umask);
        }
        let listener = listener.into_diagnostic()?;

        loop {
            let stream = listener.accept().await.into_diagnostic()?;
            let pagination = self.pagination.clone();
            tokio::spawn(async move {
                if let Err(err) = Self::serve_conn(stream, pagination).await {
                    debug!("ipc connection ended: {err:?}");
                }
            });
        }
    }

    async fn serve_conn(
        stream: interprocess::local_socket::tokio::Stream,
        pagination: Arc<Mutex<PaginationService>>,
    ) -> Result<()> {
        let (recv, mut send) = stream.split();
        let mut recv = BufReader::new(recv);
        loop {
            let Some(req) = Self::read_request(&mut recv).await? else {
                return Ok(());
            };
            let resp = Self::handle(&pagination, req).await;
            Self::write_response(&mut send, resp).await?;
        }
    }

    async fn read_request(recv: &mut BufReader<RecvHalf>) -> Result<Option<Request>> {
        let mut bytes = Vec::new();
        recv.read_until(0, &mut bytes).await.into_diagnostic()?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(deserialize_request(&bytes)?))
    }

    async fn write_response(send: &mut SendHalf, resp: Response) -> Result<()> {
        let mut bytes = serialize(&resp)?;
        bytes.push(0);
        send.write_all(&bytes).await.into_diagnostic()?;
        Ok(())
    }

    async fn handle(pagination: &Arc<Mutex<PaginationService>>, req: Request) -> Response {
        match req {
            Request::SetManifestDir { dir } => {
                let mut svc = pagination.lock().await;
                match svc.set_manifest_dir(std::path::Path::new(&dir)) {
                    Ok(()) => Self::state_response(&svc),
                    Err(e) => Self::error_response("manifest_load_failed", &e.to_string()),
                }
            }
            Request::Reload => {
                let svc = pagination.lock().await;
                Self::state_response(&svc)
            }
            Request::SetFilter { filter } => {
                let mut svc = pagination.lock().await;
                match svc.set_filter(filter) {
                    Ok(()) => Self::state_response(&svc),
                    Err(e) => Self::error_response("filter_rebuild_failed", &e.to_string()),
                }
            }
            Request::ReadRangeByIdx { start, end } => {
                let svc = pagination.lock().await;
                match svc.read_range_by_idx(start, end, None) {
                    Ok(logs) => Response::PageResponse {
                        start_idx: start,
                        end_idx: end,
                        logs,
                        version: svc.version(),
                    },
                    Err(e) => Self::error_response("read_range_failed", &e.to_string()),
                }
            }
            Request::SearchAll {
                query,
                regex,
                case_sensitive,
                range,
                top,
            } => {
                let svc = pagination.lock().await;
                match SearchQuery::new(query.clone(), regex, case_sensitive) {
                    Ok(q) => match svc.search_all(&q, SearchOptions { range, top }, None) {
                        Ok(hits) => Response::SearchResults {
                            hits: hits.into_iter().map(Into::into).collect(),
                            query,
                            version: svc.version(),
                        },
                        Err(e) => Self::error_response("search_failed", &e.to_string()),
                    },
                    Err(e) => Self::error_response("bad_search_query", &e.to_string()),
                }
            }
            Request::Cancel { key } => {
                debug!("cancel requested for {key}, no session bound to this connection");
                Response::Error {
                    code: "cancel_unsupported".to_string(),
                    message: "this server instance has no in-flight session to cancel".to_string(),
                    detail: None,
                    in_reply_to: Some(key),
                }
            }
        }
    }

    fn state_response(svc: &PaginationService) -> Response {
        Response::State {
            total: svc.get_filtered_total(),
            version: svc.version(),
            warm: svc.is_warmup_active(),
            manifest_dir: svc
                .get_manifest_dir()
                .map(|p| p.to_string_lossy().into_owned()),
        }
    }

    fn error_response(code: &str, message: &str) -> Response {
        Response::Error {
            code: code.to_string(),
            message: message.to_string(),
            detail: None,
            in_reply_to: None,
        }
    }
}
