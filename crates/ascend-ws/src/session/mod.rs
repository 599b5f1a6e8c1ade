//! Authenticated streaming session
//!
//! [`Session`] is a cheap handle onto a single driver task that owns every
//! piece of mutable session state: the state machine, the retained
//! subscription set, heartbeat timestamps and the writer side of the
//! [`BookView`]. API calls, transport frames and timers all reach the driver
//! as messages, so no state is ever touched from two places.
//!
//! # Example
//!
//! ```no_run
//! use ascend_auth::Credentials;
//! use ascend_types::Channel;
//! use ascend_ws::{Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::start(SessionConfig::new(Credentials::from_env()?))?;
//!     session.connect().await?;
//!     session.subscribe(Channel::BestBidOffer, "BTC/USDT").await?;
//!
//!     if let Some(book) = session.book().get("BTC/USDT") {
//!         println!("bid {} ask {}", book.bid.price, book.ask.price);
//!     }
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

mod driver;

use crate::book_view::BookView;
use crate::events::Event;
use crate::heartbeat::HeartbeatConfig;
use crate::reconnect::ReconnectConfig;
use crate::subscription::Subscription;
use crate::transport::{Connector, WsConnector};
use ascend_auth::Credentials;
use ascend_types::{Channel, StreamError, StreamResult, Uuid};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

use driver::{Command, Driver, Outputs};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No connection. Initial state, and the state between reconnects.
    Disconnected,
    /// Opening the socket
    Connecting,
    /// Socket open, auth request sent
    AuthPending,
    /// Server accepted the credentials
    Authenticated,
    /// Subscriptions flowing
    Active,
    /// Explicitly disconnected. Terminal.
    Closed,
}

impl SessionState {
    /// Returns true while a socket is open
    pub fn has_connection(&self) -> bool {
        matches!(self, Self::AuthPending | Self::Authenticated | Self::Active)
    }

    /// Returns true after the server accepted the credentials on the current socket
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AuthPending => "auth_pending",
            Self::Authenticated => "authenticated",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Outcome of the latest auth handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    /// No handshake on the current socket
    Unauthenticated,
    /// Auth request sent, waiting for the response
    Pending,
    /// Server accepted the credentials
    Succeeded,
    /// Server rejected the credentials
    Failed {
        /// Server error code
        code: i64,
        /// Server error message
        message: String,
    },
}

/// Configuration for a [`Session`]
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Account credentials and endpoint
    pub credentials: Credentials,
    /// How long to wait for the auth response
    pub auth_timeout: Duration,
    /// How long to wait for the socket to open
    pub connect_timeout: Duration,
    /// Server heartbeat expectations
    pub heartbeat: HeartbeatConfig,
    /// Reconnection policy
    pub reconnect: ReconnectConfig,
    /// Consecutive malformed messages that force a reconnect
    pub protocol_error_threshold: u32,
}

impl SessionConfig {
    /// Create a config with default timeouts and policies
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            auth_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            heartbeat: HeartbeatConfig::default(),
            reconnect: ReconnectConfig::default(),
            protocol_error_threshold: crate::dispatcher::DEFAULT_PROTOCOL_ERROR_THRESHOLD,
        }
    }

    /// Set auth timeout
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set heartbeat expectations
    pub fn with_heartbeat(mut self, config: HeartbeatConfig) -> Self {
        self.heartbeat = config;
        self
    }

    /// Set reconnection config
    pub fn with_reconnect(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// Disable automatic reconnection
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect = ReconnectConfig::disabled();
        self
    }

    /// Set the protocol error threshold
    pub fn with_protocol_error_threshold(mut self, threshold: u32) -> Self {
        self.protocol_error_threshold = threshold.max(1);
        self
    }
}

/// Handle to a running session
///
/// Dropping the handle shuts the session down.
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    auth: watch::Receiver<AuthStatus>,
    session_id: Uuid,
    url: String,
    book: BookView,
    events_taken: AtomicBool,
}

impl Session {
    /// Validate the config and start the session over a real WebSocket.
    ///
    /// Fails with a configuration error before any I/O if the credentials
    /// are incomplete. Must be called from within a tokio runtime.
    pub fn start(config: SessionConfig) -> StreamResult<Self> {
        let connector = WsConnector::new().with_timeout(config.connect_timeout);
        Self::start_with_connector(config, Arc::new(connector))
    }

    /// Start the session with a custom connector
    pub fn start_with_connector(config: SessionConfig, connector: Arc<dyn Connector>) -> StreamResult<Self> {
        config.credentials.validate()?;

        let session_id = Uuid::new_v4();
        let url = config.credentials.endpoint_url();
        let book = BookView::new();

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SessionState::Disconnected);
        let (auth_tx, auth) = watch::channel(AuthStatus::Unauthenticated);

        let outputs = Outputs {
            state: state_tx,
            auth: auth_tx,
            book: book.clone(),
        };
        let driver = Driver::new(config, connector, session_id, url.clone(), command_rx, outputs);
        tokio::spawn(driver.run());

        Ok(Self {
            commands,
            state,
            auth,
            session_id,
            url,
            book,
            events_taken: AtomicBool::new(false),
        })
    }

    /// Connect and authenticate.
    ///
    /// Resolves once the session is `Active`, or with the error that ended
    /// the attempt. A failed explicit connect is not retried automatically.
    pub async fn connect(&self) -> StreamResult<()> {
        self.request(Command::Connect).await?
    }

    /// Retain a subscription, sending it now if the session is `Active`.
    ///
    /// Returns false if it was already retained.
    pub async fn subscribe(&self, channel: Channel, symbol: impl Into<String>) -> StreamResult<bool> {
        let sub = Subscription::new(channel, symbol);
        self.request(|reply| Command::Subscribe(sub, reply)).await?
    }

    /// Drop a retained subscription, sending an unsubscribe if the session is `Active`.
    ///
    /// Returns false if it was not retained.
    pub async fn unsubscribe(&self, channel: Channel, symbol: impl Into<String>) -> StreamResult<bool> {
        let sub = Subscription::new(channel, symbol);
        self.request(|reply| Command::Unsubscribe(sub, reply)).await?
    }

    /// Retained subscriptions in insertion order. Empty once closed.
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.request(Command::Subscriptions).await.unwrap_or_default()
    }

    /// Cancel every open order, optionally for one symbol. Requires `Active`.
    pub async fn cancel_all(&self, symbol: Option<String>) -> StreamResult<()> {
        self.request(|reply| Command::CancelAll { symbol, reply }).await?
    }

    /// Cancel one order by its client order id. Requires `Active`.
    pub async fn cancel_order(&self, symbol: impl Into<String>, orig_coid: Uuid) -> StreamResult<()> {
        let symbol = symbol.into();
        self.request(|reply| Command::CancelOrder {
            symbol,
            orig_coid,
            reply,
        })
        .await?
    }

    /// Close the session for good. Safe to call more than once.
    pub async fn disconnect(&self) {
        // An error here means the driver already stopped
        let _ = self.request(Command::Disconnect).await;
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Outcome of the latest auth handshake
    pub fn auth_status(&self) -> AuthStatus {
        self.auth.borrow().clone()
    }

    /// Id sent in every auth request of this session
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Read-only view of the latest best bid/offer per symbol
    pub fn book(&self) -> BookView {
        self.book.clone()
    }

    /// Take the event receiver (can only be called once)
    ///
    /// Events are only produced once a receiver is attached, so a session
    /// nobody listens to buffers nothing. Take it before `connect()` to see
    /// the whole lifecycle.
    pub fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<Event>> {
        if self.events_taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        let (events, rx) = mpsc::unbounded_channel();
        // On a stopped session the sender is dropped and `rx` just ends
        let _ = self.commands.send(Command::AttachEvents(events));
        Some(rx)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> StreamResult<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| StreamError::SessionClosed)?;
        rx.await.map_err(|_| StreamError::SessionClosed)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("url", &self.url)
            .field("state", &self.state())
            .finish()
    }
}
