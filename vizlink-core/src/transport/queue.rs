//! In-process queue-pair transport.
//!
//! The host process owns the other ends: it drains the request queue,
//! forwards frames to the application by whatever means it has, and
//! pushes responses onto the response queue.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::error::{Error, Result};
use crate::transport::Transport;

/// How often `receive` checks the response queue.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The host's ends of a queue pair.
#[derive(Debug)]
pub struct HostQueues {
    /// Frames sent by the session.
    pub requests: UnboundedReceiver<Bytes>,
    /// Frames the host delivers back to the session.
    pub responses: UnboundedSender<Bytes>,
}

/// Create a connected transport and the host-side queue ends.
pub fn queue_pair() -> (QueueTransport, HostQueues) {
    let (request_tx, request_rx) = unbounded_channel();
    let (response_tx, response_rx) = unbounded_channel();
    (
        QueueTransport::new(request_tx, response_rx),
        HostQueues {
            requests: request_rx,
            responses: response_tx,
        },
    )
}

/// Transport over externally supplied request/response queues.
#[derive(Debug)]
pub struct QueueTransport {
    requests: UnboundedSender<Bytes>,
    responses: UnboundedReceiver<Bytes>,
    poll_interval: Duration,
}

impl QueueTransport {
    /// Wrap queue handles supplied by the host.
    pub fn new(requests: UnboundedSender<Bytes>, responses: UnboundedReceiver<Bytes>) -> Self {
        Self {
            requests,
            responses,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Override the response poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl Transport for QueueTransport {
    async fn send(&mut self, frame: Bytes) -> Result<()> {
        self.requests.send(frame)?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Bytes> {
        loop {
            match self.responses.try_recv() {
                Ok(frame) => return Ok(frame),
                Err(TryRecvError::Empty) => tokio::time::sleep(self.poll_interval).await,
                Err(TryRecvError::Disconnected) => return Err(Error::ConnectionClosed),
            }
        }
    }

    /// Queues have no link to drop.
    async fn reconnect(&mut self) -> Result<()> {
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "queue"
    }
}

// ── Tests ────────────────────────────────────────────────────────
