//! Local-socket client: connects with bounded exponential backoff, then
//! sends one [`Request`] and awaits its [`Response`] per call.

use crate::contract::{Request, Response};
use crate::error::IpcError;
use crate::ipc::{deserialize_response, serialize_request, sock_name};
use crate::settings::IpcSettings;
use crate::Result;
use exponential_backoff::Backoff;
use interprocess::local_socket::tokio::{RecvHalf, SendHalf};
use interprocess::local_socket::traits::tokio::Stream;
use miette::Context;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

pub struct IpcClient {
    recv: Mutex<BufReader<RecvHalf>>,
    send: Mutex<SendHalf>,
    request_timeout: Duration,
}

impl IpcClient {
    pub async fn connect(settings: &IpcSettings) -> Result<Self> {
        let client = Self::connect_(settings, "main").await?;
        trace!("connected to IPC socket");
        Ok(client)
    }

    async fn connect_(settings: &IpcSettings, name: &str) -> Result<Self> {
        let attempts = settings.connect_attempts;
        let min_delay = settings.connect_min_delay();
        let max_delay = settings.connect_max_delay();
        for duration in Backoff::new(attempts, min_delay, max_delay) {
            match interprocess::local_socket::tokio::Stream::connect(sock_name(name)?).await {
                Ok(conn) => {
                    let (recv, send) = conn.split();
                    let recv = BufReader::new(recv);
                    return Ok(Self {
                        recv: Mutex::new(recv),
                        send: Mutex::new(send),
                        request_timeout: settings.request_timeout(),
                    });
                }
                Err(err) => {
                    if let Some(duration) = duration {
                        debug!("failed to connect to IPC socket: {err:?}, retrying in {duration:?}");
                        tokio::time::sleep(duration).await;
                        continue;
                    }
                    return Err(IpcError::ConnectionFailed {
                        attempts,
                        source: Some(err),
                        help: "ensure a `logweave serve` session is running for this directory".to_string(),
                    }
                    .into());
                }
            }
        }
        Err(IpcError::ConnectionFailed {
            attempts,
            source: None,
            help: "ensure a `logweave serve` session is running for this directory".to_string(),
        }
        .into())
    }

    pub async fn send(&self, msg: &Request) -> Result<()> {
        let mut bytes = serialize_request(msg)?;
        if bytes.contains(&0) {
            return Err(IpcError::InvalidMessage {
                reason: "message contains null byte".to_string(),
            }
            .into());
        }
        bytes.push(0);
        let mut send = self.send.lock().await;
        send.write_all(&bytes)
            .await
            .map_err(|e| IpcError::SendFailed { source: e })?;
        Ok(())
    }

    async fn read(&self, timeout: Duration) -> Result<Response> {
        let mut recv = self.recv.lock().await;
        let mut bytes = Vec::new();
        match tokio::time::timeout(timeout, recv.read_until(0, &mut bytes)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => return Err(IpcError::ReadFailed { source: err }.into()),
            Err(_) => {
                return Err(IpcError::Timeout {
                    seconds: timeout.as_secs(),
                }
                .into())
            }
        }
        if bytes.is_empty() {
            return Err(IpcError::ConnectionClosed.into());
        }
        deserialize_response(&bytes).wrap_err("failed to deserialize IPC response")
    }

    pub async fn request(&self, msg: Request) -> Result<Response> {
        self.request_with_timeout(msg, self.request_timeout).await
    }

    pub async fn request_with_timeout(&self, msg: Request, timeout: Duration) -> Result<Response> {
        self.send(&msg).await?;
        self.read(timeout).await
    }

    pub fn unexpected_response(expected: &str, actual: &Response) -> IpcError {
        IpcError::UnexpectedResponse {
            expected: expected.to_string(),
            actual: format!("{actual:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_response_names_the_actual_variant() {
        let resp = Response::Error {
            code: "x".into(),
            message: "y".into(),
            detail: None,
            in_reply_to: None,
        };
        let err = IpcClient::unexpected_response("State", &resp);
        match err {
            IpcError::UnexpectedResponse { expected, actual } => {
                assert_eq!(expected, "State");
                assert!(actual.contains("Error"));
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}
