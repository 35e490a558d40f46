//! # vizlink-core
//!
//! Session protocol engine for driving a long-running visualization
//! application over a persistent duplex link.
//!
//! This crate contains:
//! - **Codec**: length-prefixed gzip header + raw payload frames
//! - **Cipher**: optional XChaCha20-Poly1305 sealing of whole frames
//! - **Transport**: the `Transport` trait, with WebSocket and queue-pair links
//! - **Paginate**: splitting oversized payloads into indexed pages
//! - **Envelope**: auth/version metadata plus the ordered task list
//! - **Retry**: bounded retry with reconnect-and-resend on dropped links
//! - **Dispatch**: status checks and typed `TaskResult` extraction
//! - **Session**: `Session::execute`, the one entry point callers need
//! - **Error**: `Error`, a `thiserror` enum with transient/fatal classes

pub mod cipher;
pub mod codec;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod options;
pub mod paginate;
pub mod result;
pub mod retry;
pub mod session;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use cipher::{CipherAdapter, FrameCipher};
pub use envelope::{
    API_VERSION, DEFAULT_EXPECTED_VERSION, EnvelopeBuilder, Task, escape_wire, task_from_value,
    unescape_wire,
};
pub use error::{Error, ErrorClass, Result};
pub use options::{AUTH_TOKEN_ENV, ENCRYPTION_KEY_ENV, SessionOptions};
pub use paginate::{DEFAULT_MAX_REQUEST_BYTES, Page, PageInfo, Paginator};
pub use result::{ColumnInfo, DataBlock, PlotReference, TaskResult};
pub use retry::{ExchangeStats, RetryPolicy};
pub use session::Session;
pub use transport::socket::Endpoint;
pub use transport::{QueueTransport, SocketTransport, Transport, queue_pair};
