//! The caller-facing session.
//!
//! A [`Session`] owns one transport for its whole life and runs one
//! request at a time: [`Session::execute`] takes `&mut self`, so a second
//! call cannot start until the first has produced its result or error.

use bytes::Bytes;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{Instrument, info, info_span};

use crate::cipher::CipherAdapter;
use crate::envelope::{EnvelopeBuilder, Task};
use crate::error::Result;
use crate::options::SessionOptions;
use crate::paginate::Paginator;
use crate::result::{PlotReference, TaskResult};
use crate::retry::{Exchange, ExchangeStats, RetryPolicy};
use crate::transport::{QueueTransport, SocketTransport, Transport};

pub struct Session {
    transport: Box<dyn Transport>,
    cipher: CipherAdapter,
    envelope: EnvelopeBuilder,
    paginator: Paginator,
    retry: RetryPolicy,
    requests_sent: u64,
    datasets: u64,
    history: Vec<PlotReference>,
    last_exchange: Option<ExchangeStats>,
}

impl Session {
    /// Wrap an existing transport. No traffic is sent.
    ///
    /// Unset credentials in `options` are read from the environment.
    pub fn new(transport: impl Transport + 'static, options: SessionOptions) -> Result<Self> {
        Self::from_boxed(Box::new(transport), options.resolve()?)
    }

    fn from_boxed(transport: Box<dyn Transport>, options: SessionOptions) -> Result<Self> {
        let cipher = CipherAdapter::from_key(options.encryption_key.as_deref())?;
        let token = options.auth_token.unwrap_or_default();
        Ok(Self {
            transport,
            cipher,
            envelope: EnvelopeBuilder::new(token, options.expected_version),
            paginator: Paginator::new(options.max_request_bytes),
            retry: options.retry,
            requests_sent: 0,
            datasets: 0,
            history: Vec::new(),
            last_exchange: None,
        })
    }

    /// Open a WebSocket to `url` and perform the handshake.
    pub async fn connect(url: impl Into<String>, options: SessionOptions) -> Result<Self> {
        let options = options.resolve()?;
        let transport = SocketTransport::connect(url).await?;
        let mut session = Self::from_boxed(Box::new(transport), options)?;
        session.handshake().await?;
        Ok(session)
    }

    /// Use host-supplied queues and perform the handshake.
    pub async fn with_queues(
        requests: UnboundedSender<Bytes>,
        responses: UnboundedReceiver<Bytes>,
        options: SessionOptions,
    ) -> Result<Self> {
        let mut session = Self::new(QueueTransport::new(requests, responses), options)?;
        session.handshake().await?;
        Ok(session)
    }

    /// Send an empty request to check the token and versions.
    pub async fn handshake(&mut self) -> Result<()> {
        self.execute(Vec::new(), &[]).await?;
        info!(
            transport = self.transport.kind(),
            encrypted = self.cipher.is_enabled(),
            "session established"
        );
        Ok(())
    }

    /// Run `tasks` in order on the remote application.
    ///
    /// `payload` is the bulk data the tasks refer to; it may be empty.
    /// Transient failures are retried; plots the response describes are
    /// appended to [`local_history`](Self::local_history).
    pub async fn execute(&mut self, tasks: Vec<Task>, payload: &[u8]) -> Result<TaskResult> {
        self.requests_sent += 1;
        let span = info_span!("execute", seq = self.requests_sent, tasks = tasks.len());
        self.exchange(&tasks, payload).instrument(span).await
    }

    async fn exchange(&mut self, tasks: &[Task], payload: &[u8]) -> Result<TaskResult> {
        let header = self.envelope.build(tasks)?;
        let pages = self.paginator.paginate(&header, payload)?;

        let mut exchange = Exchange::new(self.transport.as_mut(), &self.cipher, self.retry);
        let outcome = exchange.run(&pages).await;
        self.last_exchange = Some(exchange.stats());

        let dispatched = outcome?;
        self.history.extend(dispatched.plots);
        Ok(dispatched.result)
    }

    /// Plots described by responses so far, oldest first.
    pub fn local_history(&self) -> &[PlotReference] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Requests issued, the handshake included.
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    /// Counters from the most recent request.
    pub fn last_exchange(&self) -> Option<ExchangeStats> {
        self.last_exchange
    }

    /// A fresh name for a dataset this session uploads.
    pub fn next_dataset_name(&mut self) -> String {
        self.datasets += 1;
        format!("dataset_{}", self.datasets)
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_enabled()
    }

    pub fn transport_kind(&self) -> &'static str {
        self.transport.kind()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport.kind())
            .field("encrypted", &self.cipher.is_enabled())
            .field("envelope", &self.envelope)
            .field("retry", &self.retry)
            .field("requests_sent", &self.requests_sent)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

// ── Tests ────────────────────────────────────────────────────────
