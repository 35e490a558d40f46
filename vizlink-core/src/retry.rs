//! Bounded retry around one request/response exchange.
//!
//! ```text
//!  Sending ──► AwaitingResponse ──► Decoding ──► Done
//!     ▲            │                   │
//!     │            │ closed            │ transient
//!     │            ▼                   ▼
//!     └──── reconnect + resend      Retrying ──► Failed
//!                                      │
//!                                      └──► Sending (after back-off)
//! ```
//!
//! A dropped link is repaired once per attempt and does not use up
//! retry budget. Transient protocol errors each cost one attempt and a
//! fixed back-off sleep. Everything else fails the exchange at once.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::cipher::CipherAdapter;
use crate::codec;
use crate::dispatch::{Dispatched, dispatch};
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Attempts before giving up on transient failures.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Pause between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1500);

// ── RetryPolicy ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Fixed pause after a transient failure. Never grows.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    fn budget(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

// ── ExchangePhase ────────────────────────────────────────────────

/// Where an [`Exchange`] currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangePhase {
    #[default]
    Sending,
    AwaitingResponse,
    Decoding,
    Retrying,
    Done,
    Failed,
}

impl fmt::Display for ExchangePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sending => "Sending",
            Self::AwaitingResponse => "AwaitingResponse",
            Self::Decoding => "Decoding",
            Self::Retrying => "Retrying",
            Self::Done => "Done",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Counters for one finished exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExchangeStats {
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Times the transport was re-established.
    pub reconnects: u32,
}

// ── Exchange ─────────────────────────────────────────────────────

/// One logical request driven to a result or a final error.
pub struct Exchange<'a> {
    transport: &'a mut dyn Transport,
    cipher: &'a CipherAdapter,
    policy: RetryPolicy,
    phase: ExchangePhase,
    stats: ExchangeStats,
}

impl<'a> Exchange<'a> {
    pub fn new(
        transport: &'a mut dyn Transport,
        cipher: &'a CipherAdapter,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            cipher,
            policy,
            phase: ExchangePhase::default(),
            stats: ExchangeStats::default(),
        }
    }

    pub fn phase(&self) -> ExchangePhase {
        self.phase
    }

    pub fn stats(&self) -> ExchangeStats {
        self.stats
    }

    /// Send `pages` and wait for the correlated response.
    ///
    /// The same pages are resent unchanged on every retry.
    pub async fn run(&mut self, pages: &[Bytes]) -> Result<Dispatched> {
        let budget = self.policy.budget();
        loop {
            self.stats.attempts += 1;
            let err = match self.attempt(pages).await {
                Ok(dispatched) => {
                    self.phase = ExchangePhase::Done;
                    return Ok(dispatched);
                }
                Err(e) => e,
            };

            if !err.is_transient() {
                self.phase = ExchangePhase::Failed;
                return Err(err);
            }

            let remaining = budget - self.stats.attempts;
            if remaining == 0 {
                self.phase = ExchangePhase::Failed;
                return Err(Error::RetryLimitExceeded {
                    attempts: self.stats.attempts,
                });
            }

            self.phase = ExchangePhase::Retrying;
            warn!(
                error = %err,
                attempt = self.stats.attempts,
                remaining,
                "transient failure, retrying in {:?}",
                self.policy.backoff
            );
            tokio::time::sleep(self.policy.backoff).await;
        }
    }

    /// One attempt, with at most one reconnect-and-resend.
    async fn attempt(&mut self, pages: &[Bytes]) -> Result<Dispatched> {
        match self.round_trip(pages).await {
            Err(e) if e.is_connection_closed() => {
                info!(
                    transport = self.transport.kind(),
                    phase = %self.phase,
                    "connection closed, reconnecting"
                );
                self.stats.reconnects += 1;
                self.transport.reconnect().await?;
                self.round_trip(pages).await
            }
            other => other,
        }
    }

    async fn round_trip(&mut self, pages: &[Bytes]) -> Result<Dispatched> {
        self.phase = ExchangePhase::Sending;
        for page in pages {
            let frame = self.cipher.wrap(page.clone())?;
            self.transport.send(frame).await?;
        }
        debug!(pages = pages.len(), "request sent");

        self.phase = ExchangePhase::AwaitingResponse;
        let frame = self.transport.receive().await?;

        self.phase = ExchangePhase::Decoding;
        let frame = self.cipher.unwrap(frame)?;
        let decoded = codec::decode(frame)?;
        dispatch(&decoded.header, &decoded.payload)
    }
}

impl fmt::Debug for Exchange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("transport", &self.transport.kind())
            .field("policy", &self.policy)
            .field("phase", &self.phase)
            .field("stats", &self.stats)
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::result::TaskResult;

    enum Reply {
        Frame(Bytes),
        Closed,
    }

    /// Plays back scripted replies and counts calls.
    #[derive(Default)]
    struct Scripted {
        replies: VecDeque<Reply>,
        closed_sends: u32,
        sends: u32,
        receives: u32,
        reconnects: u32,
        fail_reconnect: bool,
    }

    impl Scripted {
        fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                replies: replies.into_iter().collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&mut self, _frame: Bytes) -> Result<()> {
            self.sends += 1;
            if self.closed_sends > 0 {
                self.closed_sends -= 1;
                return Err(Error::ConnectionClosed);
            }
            Ok(())
        }

        async fn receive(&mut self) -> Result<Bytes> {
            self.receives += 1;
            match self.replies.pop_front() {
                Some(Reply::Frame(frame)) => Ok(frame),
                Some(Reply::Closed) | None => Err(Error::ConnectionClosed),
            }
        }

        async fn reconnect(&mut self) -> Result<()> {
            self.reconnects += 1;
            if self.fail_reconnect {
                return Err(Error::Transport("refused".into()));
            }
            Ok(())
        }

        fn kind(&self) -> &'static str {
            "scripted"
        }
    }

    fn response(doc: serde_json::Value) -> Bytes {
        codec::encode(doc.to_string().as_bytes(), b"").unwrap()
    }

    fn success() -> Reply {
        Reply::Frame(response(json!({
            "AuthStatus": "Success", "VersionStatus": "Success",
            "TaskResponses": [{"TaskType": "Filter", "TaskStatus": "Success"}]
        })))
    }

    fn unknown_state() -> Reply {
        Reply::Frame(response(json!({
            "AuthStatus": "Success", "VersionStatus": "Success",
            "TaskResponses": [{"TaskStatus": "Failed"}]
        })))
    }

    fn pages() -> Vec<Bytes> {
        vec![Bytes::from_static(b"page")]
    }

    #[tokio::test]
    async fn first_attempt_success() {
        let mut transport = Scripted::new([success()]);
        let cipher = CipherAdapter::Plain;
        let mut exchange = Exchange::new(&mut transport, &cipher, RetryPolicy::default());

        let out = exchange.run(&pages()).await.unwrap();
        assert_eq!(out.result, TaskResult::Empty);
        assert_eq!(exchange.phase(), ExchangePhase::Done);
        assert_eq!(exchange.stats(), ExchangeStats { attempts: 1, reconnects: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn always_transient_hits_retry_limit() {
        let mut transport = Scripted::new((0..20).map(|_| unknown_state()));
        let cipher = CipherAdapter::Plain;
        let start = Instant::now();

        let err = Exchange::new(&mut transport, &cipher, RetryPolicy::default())
            .run(&pages())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RetryLimitExceeded { attempts: 10 }));
        assert_eq!(transport.sends, 10);
        assert_eq!(transport.receives, 10);
        // No sleep after the final attempt.
        assert_eq!(start.elapsed(), DEFAULT_BACKOFF * 9);
    }

    #[tokio::test(start_paused = true)]
    async fn three_unknown_states_then_success() {
        let mut transport = Scripted::new([unknown_state(), unknown_state(), unknown_state(), success()]);
        let cipher = CipherAdapter::Plain;
        let start = Instant::now();

        let mut exchange = Exchange::new(&mut transport, &cipher, RetryPolicy::default());
        exchange.run(&pages()).await.unwrap();
        assert_eq!(exchange.stats().attempts, 4);
        assert_eq!(start.elapsed(), Duration::from_millis(4500));
    }

    #[tokio::test]
    async fn closed_on_first_send_reconnects_once() {
        let mut transport = Scripted::new([success()]);
        transport.closed_sends = 1;
        let cipher = CipherAdapter::Plain;

        let mut exchange = Exchange::new(&mut transport, &cipher, RetryPolicy::default());
        exchange.run(&pages()).await.unwrap();
        assert_eq!(exchange.stats(), ExchangeStats { attempts: 1, reconnects: 1 });
        assert_eq!(transport.reconnects, 1);
        assert_eq!(transport.sends, 2);
    }

    #[tokio::test]
    async fn closed_while_awaiting_resends_pages() {
        let mut transport = Scripted::new([Reply::Closed, success()]);
        let cipher = CipherAdapter::Plain;
        let two_pages = vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")];

        let mut exchange = Exchange::new(&mut transport, &cipher, RetryPolicy::default());
        exchange.run(&two_pages).await.unwrap();
        assert_eq!(exchange.stats().reconnects, 1);
        assert_eq!(transport.sends, 4);
    }

    #[tokio::test]
    async fn second_close_in_same_attempt_is_fatal() {
        let mut transport = Scripted::new([Reply::Closed, Reply::Closed, success()]);
        let cipher = CipherAdapter::Plain;

        let err = Exchange::new(&mut transport, &cipher, RetryPolicy::default())
            .run(&pages())
            .await
            .unwrap_err();
        assert!(err.is_connection_closed());
        assert_eq!(transport.reconnects, 1);
    }

    #[tokio::test]
    async fn failed_reconnect_is_fatal() {
        let mut transport = Scripted::new([]);
        transport.closed_sends = 1;
        transport.fail_reconnect = true;
        let cipher = CipherAdapter::Plain;

        let err = Exchange::new(&mut transport, &cipher, RetryPolicy::default())
            .run(&pages())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn cipher_failure_short_circuits() {
        // Session expects sealed frames but the peer answers in the clear.
        let mut transport = Scripted::new([success(), success()]);
        let cipher = CipherAdapter::from_key(Some("key")).unwrap();

        let mut exchange = Exchange::new(&mut transport, &cipher, RetryPolicy::default());
        let err = exchange.run(&pages()).await.unwrap_err();
        assert!(matches!(err, Error::Cipher(_)));
        assert_eq!(exchange.stats().attempts, 1);
        assert_eq!(exchange.phase(), ExchangePhase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frame_is_retried() {
        let mut transport = Scripted::new([Reply::Frame(Bytes::from_static(b"\x01")), success()]);
        let cipher = CipherAdapter::Plain;

        let mut exchange = Exchange::new(&mut transport, &cipher, RetryPolicy::default());
        exchange.run(&pages()).await.unwrap();
        assert_eq!(exchange.stats().attempts, 2);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let mut transport = Scripted::new([unknown_state()]);
        let cipher = CipherAdapter::Plain;

        let err = Exchange::new(&mut transport, &cipher, RetryPolicy::new(0, Duration::ZERO))
            .run(&pages())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RetryLimitExceeded { attempts: 1 }));
        assert_eq!(transport.sends, 1);
    }
}
