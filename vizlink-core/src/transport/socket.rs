//! WebSocket transport to the application's API server.

use std::fmt;

use async_trait::async_trait;
use async_tungstenite::WebSocketStream;
use async_tungstenite::tokio::ConnectStream;
use async_tungstenite::tungstenite::Message;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::transport::Transport;

type WsStream = WebSocketStream<ConnectStream>;

// ── Endpoint ─────────────────────────────────────────────────────

/// Where the application's API server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    /// `host` includes the scheme, e.g. `ws://localhost`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            path: "/api".into(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        self.to_string()
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("ws://localhost", 12345)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.host, self.port, self.path)
    }
}

// ── SocketTransport ──────────────────────────────────────────────

/// A WebSocket link that remembers its URL so it can reconnect.
pub struct SocketTransport {
    url: String,
    stream: Option<WsStream>,
}

impl SocketTransport {
    /// Connect now; fails if the server is unreachable.
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let stream = open(&url).await?;
        info!(%url, "websocket connected");
        Ok(Self {
            url,
            stream: Some(stream),
        })
    }

    /// Defer connecting until the first exchange.
    ///
    /// The first send reports [`Error::ConnectionClosed`], which makes
    /// the retry controller call [`Transport::reconnect`].
    pub fn lazy(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> Result<&mut WsStream> {
        self.stream.as_mut().ok_or(Error::ConnectionClosed)
    }

    /// Forget the stream if `err` means the link is gone.
    fn note_error(&mut self, err: Error) -> Error {
        if err.is_connection_closed() {
            self.stream = None;
        }
        err
    }
}

async fn open(url: &str) -> Result<WsStream> {
    let (stream, _response) = async_tungstenite::tokio::connect_async(url).await?;
    Ok(stream)
}

#[async_trait]
impl Transport for SocketTransport {
    async fn send(&mut self, frame: Bytes) -> Result<()> {
        let len = frame.len();
        let result = self.stream()?.send(Message::Binary(frame.to_vec())).await;
        match result {
            Ok(()) => {
                debug!(bytes = len, "frame sent");
                Ok(())
            }
            Err(e) => Err(self.note_error(e.into())),
        }
    }

    async fn receive(&mut self) -> Result<Bytes> {
        loop {
            let next = self.stream()?.next().await;
            match next {
                Some(Ok(Message::Binary(data))) => {
                    debug!(bytes = data.len(), "frame received");
                    return Ok(Bytes::from(data));
                }
                Some(Ok(Message::Text(_))) => {
                    return Err(Error::MalformedResponse(
                        "text message where a binary frame was expected".into(),
                    ));
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.stream = None;
                    return Err(Error::ConnectionClosed);
                }
                // Control frames carry nothing for us.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(e)) => return Err(self.note_error(e.into())),
            }
        }
    }

    async fn reconnect(&mut self) -> Result<()> {
        if let Some(mut old) = self.stream.take() {
            // The peer may already be gone; a failed close is expected then.
            let _ = old.close(None).await;
        }
        info!(url = %self.url, "reconnecting websocket");
        self.stream = Some(open(&self.url).await?);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "websocket"
    }
}

impl fmt::Debug for SocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketTransport")
            .field("url", &self.url)
            .field("connected", &self.stream.is_some())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Echo every binary message back, on as many connections as arrive.
    async fn echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut ws = async_tungstenite::tokio::accept_async(tcp).await.unwrap();
                    while let Some(Ok(msg)) = ws.next().await {
                        if msg.is_binary() && ws.send(msg).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        format!("ws://{addr}/api")
    }

    #[test]
    fn endpoint_formats_url() {
        assert_eq!(Endpoint::default().url(), "ws://localhost:12345/api");
        let ep = Endpoint::new("ws://10.0.0.5", 8080).with_path("/v2");
        assert_eq!(ep.to_string(), "ws://10.0.0.5:8080/v2");
    }

    #[tokio::test]
    async fn send_and_receive_binary() {
        let url = echo_server().await;
        let mut transport = SocketTransport::connect(url).await.unwrap();

        transport.send(Bytes::from_static(b"\x01\x02\x03")).await.unwrap();
        let echoed = transport.receive().await.unwrap();
        assert_eq!(&echoed[..], b"\x01\x02\x03");
    }

    #[tokio::test]
    async fn reconnect_twice_leaves_usable_link() {
        let url = echo_server().await;
        let mut transport = SocketTransport::connect(url).await.unwrap();

        transport.reconnect().await.unwrap();
        transport.reconnect().await.unwrap();
        assert!(transport.is_connected());

        transport.send(Bytes::from_static(b"after")).await.unwrap();
        assert_eq!(&transport.receive().await.unwrap()[..], b"after");
    }

    #[tokio::test]
    async fn lazy_transport_reports_closed_until_reconnected() {
        let url = echo_server().await;
        let mut transport = SocketTransport::lazy(url);

        let err = transport.send(Bytes::from_static(b"x")).await.unwrap_err();
        assert!(err.is_connection_closed());

        transport.reconnect().await.unwrap();
        transport.send(Bytes::from_static(b"x")).await.unwrap();
        assert_eq!(&transport.receive().await.unwrap()[..], b"x");
    }

    #[tokio::test]
    async fn unreachable_server_is_fatal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = SocketTransport::connect(format!("ws://{addr}/api")).await.unwrap_err();
        assert!(!err.is_connection_closed());
        assert!(!err.is_transient());
    }
}
