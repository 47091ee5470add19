//! Structured diagnostic error types for rich error reporting via miette.

use miette::Diagnostic;
use thiserror::Error;

/// Errors from compiling or applying a parser rule set.
#[derive(Debug, Error, Diagnostic)]
pub enum RuleError {
    #[error("parser template has unsupported version {found} (expected 1)")]
    #[diagnostic(code(logweave::parser::bad_version))]
    BadVersion { found: u32 },

    #[error("rule {index} has invalid glob '{pattern}'")]
    #[diagnostic(code(logweave::parser::bad_glob))]
    BadGlob {
        index: usize,
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("rule {index} field '{field}' has invalid regex")]
    #[diagnostic(code(logweave::parser::bad_regex))]
    BadRegex {
        index: usize,
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("no rule defined for file '{path}'")]
    #[diagnostic(
        code(logweave::parser::no_rule),
        help("add a rule whose `match` glob covers this file, or treat it as raw text")
    )]
    NoRule { path: String },
}

/// Errors from manifest load/save and invariant checks.
#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    #[error("failed to read manifest at {}", path.display())]
    #[diagnostic(code(logweave::manifest::read_error))]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest at {}", path.display())]
    #[diagnostic(code(logweave::manifest::parse_error))]
    ParseError {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest chunk {index} start offset {found} does not match expected {expected}")]
    #[diagnostic(
        code(logweave::manifest::bad_chunk_offsets),
        help("the manifest is internally inconsistent; regenerate the merge output")
    )]
    BadChunkOffsets {
        index: usize,
        found: u64,
        expected: u64,
    },

    #[error("failed to write manifest at {}", path.display())]
    #[diagnostic(code(logweave::manifest::write_error))]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from chunk writing (rotation, atomic rename).
#[derive(Debug, Error, Diagnostic)]
pub enum ChunkWriteError {
    #[error("exhausted {attempts} attempts allocating a chunk part file in {}", dir.display())]
    #[diagnostic(
        code(logweave::chunk::exhausted_attempts),
        help("check that the output directory is writable and not full")
    )]
    ExhaustedAttempts {
        dir: std::path::PathBuf,
        attempts: u32,
    },

    #[error("failed writing chunk temp file in {}", dir.display())]
    #[diagnostic(code(logweave::chunk::write_failed))]
    WriteFailed {
        dir: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by a merge session as a whole.
#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("merge session was canceled")]
    #[diagnostic(code(logweave::session::canceled))]
    Canceled,

    #[error("input directory {} does not exist or is not readable", path.display())]
    #[diagnostic(code(logweave::session::bad_input_dir))]
    BadInputDir { path: std::path::PathBuf },

    #[error("{0}")]
    #[diagnostic(code(logweave::session::config))]
    Config(String),
}

/// Errors from the local IPC transport.
#[derive(Debug, Error, Diagnostic)]
pub enum IpcError {
    #[error("failed to connect to IPC socket after {attempts} attempts")]
    #[diagnostic(code(logweave::ipc::connection_failed))]
    ConnectionFailed {
        attempts: u32,
        #[source]
        source: Option<std::io::Error>,
        #[help]
        help: String,
    },

    #[error("IPC message contains a null byte, cannot be framed")]
    #[diagnostic(code(logweave::ipc::invalid_message))]
    InvalidMessage { reason: String },

    #[error("failed to send IPC message")]
    #[diagnostic(code(logweave::ipc::send_failed))]
    SendFailed {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read IPC message")]
    #[diagnostic(code(logweave::ipc::read_failed))]
    ReadFailed {
        #[source]
        source: std::io::Error,
    },

    #[error("IPC request timed out after {seconds}s")]
    #[diagnostic(code(logweave::ipc::timeout))]
    Timeout { seconds: u64 },

    #[error("IPC connection closed by peer")]
    #[diagnostic(code(logweave::ipc::connection_closed))]
    ConnectionClosed,

    #[error("unexpected IPC response: expected {expected}, got {actual}")]
    #[diagnostic(code(logweave::ipc::unexpected_response))]
    UnexpectedResponse { expected: String, actual: String },
}
