//! Error types for the session protocol engine.
//!
//! Every fallible operation returns `Result<T, Error>`. Each variant
//! belongs to exactly one class: *transient* errors are eligible for
//! the bounded retry loop, everything else is *fatal* and aborts the
//! current exchange.

use async_tungstenite::tungstenite;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Retry classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// May succeed if the same request is sent again.
    Transient,
    /// Retrying the same request cannot help.
    Fatal,
}

/// The canonical error type for vizlink.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transient Protocol Errors ────────────────────────────────
    /// The server has not settled the outcome of a task yet.
    #[error("task execution state unknown; the server did not report a reason")]
    UnknownExecutionState,

    /// The response bytes are structurally malformed.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    // ── Transport Errors ─────────────────────────────────────────
    /// The duplex connection or queue was closed mid-exchange.
    #[error("connection closed")]
    ConnectionClosed,

    /// The transport failed in a way a reconnect cannot fix.
    #[error("transport error: {0}")]
    Transport(String),

    /// The TCP/IO layer reported an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // ── Codec / Cipher Errors ────────────────────────────────────
    /// A compressed header could not be inflated or deflated.
    #[error("codec error: {0}")]
    Codec(String),

    /// Frame encryption or decryption failed.
    #[error("cipher error: {0}")]
    Cipher(&'static str),

    /// The compressed header leaves no room for payload in a page.
    #[error("request header too large: {header} bytes (frame budget {budget})")]
    HeaderTooLarge { header: u64, budget: u64 },

    /// The payload would need more pages than the wire format can index.
    #[error("payload too large: {size} bytes needs more than {max_pages} pages")]
    PayloadTooLarge { size: u64, max_pages: u64 },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Server Rejections ────────────────────────────────────────
    /// The server rejected the auth token.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Client and server versions are not compatible.
    #[error("{}", version_mismatch_message(.reason, .server_version, .expected_api_version))]
    VersionMismatch {
        reason: String,
        server_version: String,
        expected_api_version: String,
    },

    /// A task in the request failed on the server.
    #[error("task '{task_type}' failed because '{reason}'{}", note_suffix(.note))]
    TaskFailed {
        task_type: String,
        reason: String,
        note: Option<String>,
    },

    // ── Retry ────────────────────────────────────────────────────
    /// All attempts were consumed by transient failures.
    #[error(
        "failed to execute the request after {attempts} attempts; \
         check that the application is running and its API server is enabled"
    )]
    RetryLimitExceeded { attempts: u32 },

    // ── Configuration ────────────────────────────────────────────
    /// No auth token was supplied and none was found in the environment.
    #[error("no auth token: pass one explicitly or set {0}")]
    MissingAuthToken(&'static str),

    /// A configuration value is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Classify this error for the retry controller.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::UnknownExecutionState | Error::MalformedResponse(_) => ErrorClass::Transient,
            _ => ErrorClass::Fatal,
        }
    }

    /// Returns `true` if the same request may be sent again.
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Returns `true` if a reconnect may recover the exchange.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Error::ConnectionClosed)
    }
}

fn version_mismatch_message(reason: &str, server: &str, expected: &str) -> String {
    let client = env!("CARGO_PKG_VERSION");
    match reason {
        "InvalidApiVersion" => format!(
            "client version ({client}) is not supported by the server ({server}); \
             the server expects client version {expected} or greater"
        ),
        "InvalidServerVersion" => format!(
            "server version ({server}) is not supported by this client ({client}); \
             update the application"
        ),
        other => format!("version check failed ({other}): server {server}, client {client}"),
    }
}

fn note_suffix(note: &Option<String>) -> String {
    match note {
        Some(n) => format!(". Note: '{n}'"),
        None => String::new(),
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        use std::io::ErrorKind;
        use tungstenite::error::ProtocolError;

        match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Error::ConnectionClosed
            }
            tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
                Error::ConnectionClosed
            }
            tungstenite::Error::Io(io)
                if matches!(
                    io.kind(),
                    ErrorKind::ConnectionAborted
                        | ErrorKind::ConnectionReset
                        | ErrorKind::BrokenPipe
                        | ErrorKind::UnexpectedEof
                ) =>
            {
                Error::ConnectionClosed
            }
            other => Error::Transport(other.to_string()),
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::ConnectionClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::UnknownExecutionState.is_transient());
        assert!(Error::MalformedResponse("short".into()).is_transient());
        assert!(!Error::Cipher("bad tag").is_transient());
        assert!(!Error::ConnectionClosed.is_transient());
        assert_eq!(
            Error::RetryLimitExceeded { attempts: 10 }.class(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn task_failure_message_includes_note() {
        let e = Error::TaskFailed {
            task_type: "Filter".into(),
            reason: "no such column".into(),
            note: Some("check spelling".into()),
        };
        let msg = e.to_string();
        assert!(msg.contains("'Filter'"));
        assert!(msg.contains("no such column"));
        assert!(msg.ends_with("Note: 'check spelling'"));
    }

    #[test]
    fn version_mismatch_distinguishes_sides() {
        let client_old = Error::VersionMismatch {
            reason: "InvalidApiVersion".into(),
            server_version: "2.0.0".into(),
            expected_api_version: "1.9.0".into(),
        };
        assert!(client_old.to_string().contains("expects client version 1.9.0"));

        let server_old = Error::VersionMismatch {
            reason: "InvalidServerVersion".into(),
            server_version: "1.0.0".into(),
            expected_api_version: String::new(),
        };
        assert!(server_old.to_string().contains("update the application"));
    }

    #[test]
    fn websocket_close_maps_to_connection_closed() {
        let e: Error = tungstenite::Error::ConnectionClosed.into();
        assert!(e.is_connection_closed());

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let e: Error = tungstenite::Error::Io(io).into();
        assert!(e.is_connection_closed());

        let e: Error = tungstenite::Error::Utf8.into();
        assert!(matches!(e, Error::Transport(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad gzip");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
    }
}
