//! Local-socket transport for the [`crate::contract`] request/response
//! contract: NUL-terminated JSON or MessagePack frames over
//! `interprocess`'s local socket, the same framing idiom the teacher uses
//! for its own control-plane IPC.

use crate::contract::{Request, Response};
use crate::env;
use crate::Result;
use interprocess::local_socket::{GenericFilePath, Name, ToFsName};
use miette::{Context, IntoDiagnostic};

pub mod client;
pub mod server;

pub fn sock_name(name: &str) -> Result<Name<'_>> {
    let path = env::IPC_SOCK_DIR.join(name).with_extension("sock");
    path.to_fs_name::<GenericFilePath>().into_diagnostic()
}

fn serialize(msg: &Response) -> Result<Vec<u8>> {
    if *env::IPC_JSON {
        serde_json::to_vec(msg)
            .into_diagnostic()
            .wrap_err("failed to serialize IPC response as JSON")
    } else {
        rmp_serde::to_vec(msg)
            .into_diagnostic()
            .wrap_err("failed to serialize IPC response as MessagePack")
    }
}

fn serialize_request(msg: &Request) -> Result<Vec<u8>> {
    if *env::IPC_JSON {
        serde_json::to_vec(msg)
            .into_diagnostic()
            .wrap_err("failed to serialize IPC request as JSON")
    } else {
        rmp_serde::to_vec(msg)
            .into_diagnostic()
            .wrap_err("failed to serialize IPC request as MessagePack")
    }
}

fn deserialize_request(bytes: &[u8]) -> Result<Request> {
    decode(bytes, "request")
}

fn deserialize_response(bytes: &[u8]) -> Result<Response> {
    decode(bytes, "response")
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    let mut bytes = bytes.to_vec();
    bytes.pop();
    if *env::IPC_JSON {
        serde_json::from_slice(&bytes)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to deserialize IPC {what} as JSON"))
    } else {
        rmp_serde::from_slice(&bytes)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to deserialize IPC {what} as MessagePack"))
    }
}
