//! Byte transports between the session and the remote application.
//!
//! The engine only ever needs three operations: push one frame out,
//! wait for one frame back, and re-establish the link after it drops.
//! Two implementations exist:
//!
//! - [`SocketTransport`]: a WebSocket connection to the application's
//!   API server. Message boundaries come from the WebSocket framing.
//! - [`QueueTransport`]: a pair of in-process queues, for hosts that
//!   embed the client and relay frames themselves.
//!
//! Both report a dropped link as [`Error::ConnectionClosed`] so the
//! retry controller can reconnect without knowing which one it holds.
//!
//! [`Error::ConnectionClosed`]: crate::Error::ConnectionClosed

pub mod queue;
pub mod socket;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use queue::{QueueTransport, queue_pair};
pub use socket::SocketTransport;

/// A duplex channel carrying whole frames.
#[async_trait]
pub trait Transport: Send {
    /// Send one frame.
    async fn send(&mut self, frame: Bytes) -> Result<()>;

    /// Wait until one complete inbound frame is available.
    async fn receive(&mut self) -> Result<Bytes>;

    /// Re-establish the link to the last-known target.
    ///
    /// Must be safe to call on a healthy link; the old link is released
    /// before the new one takes its place.
    async fn reconnect(&mut self) -> Result<()>;

    /// Short label for logs.
    fn kind(&self) -> &'static str;
}
