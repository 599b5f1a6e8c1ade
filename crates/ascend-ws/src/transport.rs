//! WebSocket transport abstraction
//!
//! A [`Connector`] opens one connection and hands back a [`Connection`]: a
//! [`TransportHandle`] for the single outbound path plus a receiver of
//! [`TransportEvent`]s. Each connection is driven by its own I/O task that
//! owns both halves of the socket, so writes are never interleaved and the
//! receive side never blocks senders.
//!
//! The transport performs no retries and no protocol interpretation.
//!
//! # Example
//!
//! ```no_run
//! use ascend_ws::transport::{Connector, TransportError, TransportEvent, WsConnector};
//!
//! async fn example() -> Result<(), TransportError> {
//!     let connector = WsConnector::new();
//!     let mut conn = connector.open("wss://ascendex.com/1/api/pro/v1/stream").await?;
//!     conn.handle.send(r#"{"op":"pong"}"#)?;
//!     while let Some(event) = conn.events.recv().await {
//!         match event {
//!             TransportEvent::Frame(text) => println!("Received: {}", text),
//!             TransportEvent::Closed(_) => break,
//!         }
//!     }
//!     conn.handle.close();
//!     Ok(())
//! }
//! ```

use ascend_types::StreamError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument, warn};

/// Transport layer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout
    #[error("connection timeout after {0:?}")]
    Timeout(Duration),

    /// Not connected
    #[error("not connected")]
    NotConnected,
}

impl From<TransportError> for StreamError {
    fn from(err: TransportError) -> Self {
        StreamError::Connection(err.to_string())
    }
}

/// Something that happened on an open connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Inbound text frame
    Frame(String),
    /// Connection ended. Sent exactly once, last. `None` means a graceful close.
    Closed(Option<TransportError>),
}

/// Frame queued on the outbound path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Text message
    Text(String),
    /// Close the socket after flushing everything queued before it
    Close,
}

/// Sending half of a connection
///
/// Cloning shares the same outbound path.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    closed: Arc<AtomicBool>,
}

impl TransportHandle {
    /// Create a handle and the receiver an I/O task drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let handle = Self {
            outbound,
            closed: Arc::new(AtomicBool::new(false)),
        };
        (handle, rx)
    }

    /// Queue a text frame
    pub fn send(&self, message: impl Into<String>) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::NotConnected);
        }
        self.outbound
            .send(OutboundFrame::Text(message.into()))
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Close the connection. Safe to call any number of times.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.outbound.send(OutboundFrame::Close);
        }
    }

    /// Returns true once `close` was called or the I/O task is gone
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.outbound.is_closed()
    }
}

/// An open connection
#[derive(Debug)]
pub struct Connection {
    /// Outbound path
    pub handle: TransportHandle,
    /// Inbound frames, terminated by one [`TransportEvent::Closed`]
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens connections
///
/// This trait enables unit testing of session logic by allowing mock
/// implementations to be injected instead of real WebSocket connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `url`
    async fn open(&self, url: &str) -> Result<Connection, TransportError>;
}

/// Real WebSocket connector using tokio-tungstenite
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    /// Create a connector with a 10 second connect timeout
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WsConnector {
    #[instrument(skip(self), fields(url = %url))]
    async fn open(&self, url: &str) -> Result<Connection, TransportError> {
        debug!("Connecting to WebSocket");

        let (ws_stream, _response) = timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (handle, outbound) = TransportHandle::channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(ws_stream, outbound, events_tx));

        debug!("WebSocket connected");
        Ok(Connection { handle, events })
    }
}

async fn run_socket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let (mut write, mut read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(OutboundFrame::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        break Some(TransportError::SendFailed(e.to_string()));
                    }
                }
                Some(OutboundFrame::Close) | None => {
                    debug!("Closing socket");
                    let _ = write.send(Message::Close(None)).await;
                    break None;
                }
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Frame(text));
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => {
                        let _ = events.send(TransportEvent::Frame(text));
                    }
                    Err(e) => warn!("Dropping non UTF-8 binary frame: {}", e),
                },
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Server closed socket");
                    break None;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(TransportError::ReceiveFailed(e.to_string())),
                None => break Some(TransportError::ConnectionClosed),
            },
        }
    };

    let _ = events.send(TransportEvent::Closed(reason));
}

/// Mock connector for testing
///
/// Every successful `open` hands a [`MockLink`] to the paired [`MockServer`],
/// which lets tests inject frames and inspect what the client sent.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockConnector {
    links: mpsc::UnboundedSender<MockLink>,
    failures: parking_lot::Mutex<std::collections::VecDeque<TransportError>>,
    opened: std::sync::atomic::AtomicU32,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockConnector {
    /// Create a connector and its server side
    pub fn new() -> (Arc<Self>, MockServer) {
        let (links, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            links,
            failures: parking_lot::Mutex::new(std::collections::VecDeque::new()),
            opened: std::sync::atomic::AtomicU32::new(0),
        });
        (connector, MockServer { links: rx })
    }

    /// Make the next `open` fail with `error`
    pub fn fail_next(&self, error: TransportError) {
        self.failures.lock().push_back(error);
    }

    /// Number of `open` calls so far, including failed ones
    pub fn open_count(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> Result<Connection, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }

        let (handle, sent) = TransportHandle::channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let link = MockLink {
            url: url.to_string(),
            events: events_tx,
            sent,
        };

        self.links
            .send(link)
            .map_err(|_| TransportError::ConnectionFailed("mock server dropped".into()))?;

        Ok(Connection { handle, events })
    }
}

/// Server side of a [`MockConnector`]
#[cfg(any(test, feature = "test-utils"))]
pub struct MockServer {
    links: mpsc::UnboundedReceiver<MockLink>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockServer {
    /// Wait for the client to open the next connection
    pub async fn accept(&mut self) -> Option<MockLink> {
        self.links.recv().await
    }

    /// Take an already opened connection, if any
    pub fn try_accept(&mut self) -> Option<MockLink> {
        self.links.try_recv().ok()
    }
}

/// One mock connection, seen from the server
#[cfg(any(test, feature = "test-utils"))]
pub struct MockLink {
    url: String,
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: mpsc::UnboundedReceiver<OutboundFrame>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockLink {
    /// URL the client opened
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver a frame to the client
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Frame(frame.into()));
    }

    /// Drop the connection from the server side
    pub fn drop_connection(&self, error: Option<TransportError>) {
        let _ = self.events.send(TransportEvent::Closed(error));
    }

    /// Wait for the next frame the client sent
    pub async fn next_sent(&mut self) -> Option<OutboundFrame> {
        self.sent.recv().await
    }

    /// Wait for the next text frame the client sent, parsed as JSON
    pub async fn next_json(&mut self) -> Option<serde_json::Value> {
        match self.sent.recv().await? {
            OutboundFrame::Text(text) => serde_json::from_str(&text).ok(),
            OutboundFrame::Close => None,
        }
    }

    /// Everything the client sent that has not been read yet
    pub fn drain_sent(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.sent.try_recv() {
            frames.push(frame);
        }
        frames
    }
}
