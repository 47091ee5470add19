//! The consumer-facing request/response contract, transport-agnostic.
//!
//! This is the wire shape any transport (the local-socket one in
//! [`crate::ipc`], or another) serializes. Mirrors the teacher's
//! `IpcRequest`/`IpcResponse` split: one enum of things a consumer asks for,
//! one enum of things the engine reports back.

use crate::filter::Filter;
use crate::model::LogEntry;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIs};

#[derive(Debug, Clone, Serialize, Deserialize, Display, EnumIs)]
#[serde(tag = "type", rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Request {
    SetManifestDir { dir: String },
    Reload,
    SetFilter { filter: Option<Filter> },
    ReadRangeByIdx { start: u64, end: u64 },
    SearchAll {
        query: String,
        regex: bool,
        case_sensitive: bool,
        range: Option<(u64, u64)>,
        top: Option<usize>,
    },
    Cancel { key: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Display, EnumIs)]
#[serde(tag = "type", rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Response {
    PageResponse {
        start_idx: u64,
        end_idx: u64,
        logs: Vec<LogEntry>,
        version: u64,
    },
    State {
        total: u64,
        version: u64,
        warm: bool,
        manifest_dir: Option<String>,
    },
    SearchResults {
        hits: Vec<SearchHitWire>,
        query: String,
        version: u64,
    },
    Progress {
        inc: u64,
        done: u64,
        total: Option<u64>,
        active: bool,
    },
    Saved {
        out_dir: String,
        manifest_path: String,
        chunk_count: usize,
        merged: u64,
        total: Option<u64>,
    },
    Error {
        code: String,
        message: String,
        detail: Option<String>,
        in_reply_to: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHitWire {
    pub idx: u64,
    pub text: String,
}

impl From<crate::pagination::SearchHit> for SearchHitWire {
    fn from(h: crate::pagination::SearchHit) -> Self {
        Self { idx: h.idx, text: h.text }
    }
}
