//! Session driver task
//!
//! One task, one `select!` loop. Connection attempts run in their own tasks
//! and report back through the mailbox tagged with an epoch; anything from an
//! epoch other than the current one is stale and ignored.

use super::{AuthStatus, SessionConfig, SessionState};
use crate::book_view::BookView;
use crate::dispatcher::{DispatchOutcome, Dispatcher, MessageHandler};
use crate::events::{ConnectionEvent, DisconnectReason, Event, MarketEvent, SubscriptionEvent};
use crate::heartbeat::{HeartbeatMonitor, Liveness};
use crate::reconnect::Backoff;
use crate::subscription::{Subscription, SubscriptionSet};
use crate::transport::{Connection, Connector, TransportError, TransportEvent, TransportHandle};
use ascend_auth::auth_payload;
use ascend_types::{
    Ack, AuthRequest, AuthResponse, BookUpdate, CancelAllRequest, CancelOrderRequest, Channel, Connected,
    DisconnectMessage, Heartbeat, PongMessage, StreamError, StreamResult, Uuid,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Requests from the [`Session`](super::Session) handle
pub(super) enum Command {
    Connect(oneshot::Sender<StreamResult<()>>),
    Subscribe(Subscription, oneshot::Sender<StreamResult<bool>>),
    Unsubscribe(Subscription, oneshot::Sender<StreamResult<bool>>),
    Subscriptions(oneshot::Sender<Vec<Subscription>>),
    CancelAll {
        symbol: Option<String>,
        reply: oneshot::Sender<StreamResult<()>>,
    },
    CancelOrder {
        symbol: String,
        orig_coid: Uuid,
        reply: oneshot::Sender<StreamResult<()>>,
    },
    Disconnect(oneshot::Sender<()>),
    /// Start delivering events to this sender
    AttachEvents(mpsc::UnboundedSender<Event>),
}

/// Everything the driver publishes to the outside
pub(super) struct Outputs {
    pub state: watch::Sender<SessionState>,
    pub auth: watch::Sender<AuthStatus>,
    pub book: BookView,
}

enum Mail {
    Opened {
        epoch: u64,
        result: Result<TransportHandle, TransportError>,
    },
    Transport {
        epoch: u64,
        event: TransportEvent,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Started by `connect()`; failures go back to the caller
    Explicit,
    /// Started by the reconnection policy
    Reconnect,
}

pub(super) struct Driver {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    session_id: Uuid,
    url: String,
    commands: mpsc::UnboundedReceiver<Command>,
    mail_tx: mpsc::UnboundedSender<Mail>,
    mail_rx: mpsc::UnboundedReceiver<Mail>,
    out: Outputs,
    events: Option<mpsc::UnboundedSender<Event>>,

    state: SessionState,
    subscriptions: SubscriptionSet,
    heartbeat: HeartbeatMonitor,
    backoff: Backoff,
    epoch: u64,
    link: Option<TransportHandle>,
    origin: Origin,
    waiters: Vec<oneshot::Sender<StreamResult<()>>>,
    auth_deadline: Option<Instant>,
    reconnect_at: Option<Instant>,
    has_been_active: bool,
}

impl Driver {
    pub(super) fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        session_id: Uuid,
        url: String,
        commands: mpsc::UnboundedReceiver<Command>,
        out: Outputs,
    ) -> Self {
        let (mail_tx, mail_rx) = mpsc::unbounded_channel();
        let heartbeat = HeartbeatMonitor::new(config.heartbeat.clone());
        let backoff = Backoff::new(config.reconnect.clone());

        Self {
            config,
            connector,
            session_id,
            url,
            commands,
            mail_tx,
            mail_rx,
            out,
            events: None,
            state: SessionState::Disconnected,
            subscriptions: SubscriptionSet::new(),
            heartbeat,
            backoff,
            epoch: 0,
            link: None,
            origin: Origin::Explicit,
            waiters: Vec::new(),
            auth_deadline: None,
            reconnect_at: None,
            has_been_active: false,
        }
    }

    pub(super) async fn run(mut self) {
        let mut dispatcher = Dispatcher::new(self.config.protocol_error_threshold);
        let mut ticker = time::interval(self.config.heartbeat.check_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(session_id = %self.session_id, url = %self.url, "Session started");

        while self.state != SessionState::Closed {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("Session handle dropped");
                        self.shutdown();
                    }
                },
                Some(mail) = self.mail_rx.recv() => self.handle_mail(mail, &mut dispatcher),
                _ = ticker.tick(), if self.heartbeat.is_armed() => self.check_liveness(),
                _ = time::sleep_until(self.auth_deadline.unwrap_or_else(Instant::now)),
                    if self.auth_deadline.is_some() => self.auth_timed_out(),
                _ = time::sleep_until(self.reconnect_at.unwrap_or_else(Instant::now)),
                    if self.reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    self.start_attempt(Origin::Reconnect);
                }
            }
        }

        info!(session_id = %self.session_id, "Session closed");
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(reply) => self.connect(reply),
            Command::Subscribe(sub, reply) => {
                let _ = reply.send(Ok(self.subscribe(sub)));
            }
            Command::Unsubscribe(sub, reply) => {
                let _ = reply.send(Ok(self.unsubscribe(sub)));
            }
            Command::Subscriptions(reply) => {
                let _ = reply.send(self.subscriptions.to_vec());
            }
            Command::CancelAll { symbol, reply } => {
                let result = self
                    .require_active()
                    .and_then(|()| self.send(&CancelAllRequest::new(now_ms(), symbol)));
                let _ = reply.send(result);
            }
            Command::CancelOrder {
                symbol,
                orig_coid,
                reply,
            } => {
                let result = self
                    .require_active()
                    .and_then(|()| self.send(&CancelOrderRequest::new(now_ms(), symbol, orig_coid)));
                let _ = reply.send(result);
            }
            Command::Disconnect(reply) => {
                self.shutdown();
                let _ = reply.send(());
            }
            Command::AttachEvents(events) => self.events = Some(events),
        }
    }

    fn connect(&mut self, reply: oneshot::Sender<StreamResult<()>>) {
        match self.state {
            SessionState::Active => {
                let _ = reply.send(Ok(()));
            }
            SessionState::Closed => {
                let _ = reply.send(Err(StreamError::SessionClosed));
            }
            SessionState::Disconnected => {
                self.waiters.push(reply);
                // Connecting early during a backoff wait keeps reconnect semantics
                let origin = if self.reconnect_at.is_some() {
                    Origin::Reconnect
                } else {
                    Origin::Explicit
                };
                self.start_attempt(origin);
            }
            SessionState::Connecting | SessionState::AuthPending | SessionState::Authenticated => {
                self.waiters.push(reply);
            }
        }
    }

    fn subscribe(&mut self, sub: Subscription) -> bool {
        if !self.subscriptions.insert(sub.clone()) {
            debug!(%sub, "Already subscribed");
            return false;
        }

        if self.state == SessionState::Active {
            match self.send(&sub.subscribe_request()) {
                Ok(()) => {
                    info!(%sub, "Subscribing");
                    self.emit(SubscriptionEvent::Requested(sub));
                }
                Err(e) => warn!(%sub, "Subscribe not sent, will restore on reconnect: {}", e),
            }
        } else {
            debug!(%sub, state = %self.state, "Subscription retained until active");
        }
        true
    }

    fn unsubscribe(&mut self, sub: Subscription) -> bool {
        if !self.subscriptions.remove(&sub) {
            return false;
        }
        if sub.channel == Channel::BestBidOffer {
            self.out.book.remove(&sub.symbol);
        }

        if self.state == SessionState::Active {
            match self.send(&sub.unsubscribe_request()) {
                Ok(()) => {
                    info!(%sub, "Unsubscribing");
                    self.emit(SubscriptionEvent::Unsubscribed(sub));
                }
                Err(e) => warn!(%sub, "Unsubscribe not sent: {}", e),
            }
        }
        true
    }

    fn require_active(&self) -> StreamResult<()> {
        if self.state == SessionState::Active {
            Ok(())
        } else {
            Err(StreamError::Connection("not active".into()))
        }
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    fn start_attempt(&mut self, origin: Origin) {
        self.reconnect_at = None;
        self.epoch += 1;
        self.origin = origin;
        self.set_state(SessionState::Connecting);
        info!(url = %self.url, attempt = self.backoff.attempt(), "Connecting");

        let epoch = self.epoch;
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let mail = self.mail_tx.clone();
        let connect_timeout = self.config.connect_timeout;

        tokio::spawn(async move {
            let result = match time::timeout(connect_timeout, connector.open(&url)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(connect_timeout)),
            };
            match result {
                Ok(connection) => forward(epoch, connection, mail).await,
                Err(e) => {
                    let _ = mail.send(Mail::Opened { epoch, result: Err(e) });
                }
            }
        });
    }

    fn handle_mail(&mut self, mail: Mail, dispatcher: &mut Dispatcher) {
        match mail {
            Mail::Opened { epoch, result } => self.on_opened(epoch, result, dispatcher),
            Mail::Transport { epoch, .. } if epoch != self.epoch => {
                debug!(epoch, current = self.epoch, "Discarding event from stale connection");
            }
            Mail::Transport {
                event: TransportEvent::Frame(text),
                ..
            } => self.on_frame(&text, dispatcher),
            Mail::Transport {
                event: TransportEvent::Closed(error),
                ..
            } => self.on_closed(error),
        }
    }

    fn on_opened(
        &mut self,
        epoch: u64,
        result: Result<TransportHandle, TransportError>,
        dispatcher: &mut Dispatcher,
    ) {
        if epoch != self.epoch || self.state != SessionState::Connecting {
            if let Ok(handle) = result {
                debug!(epoch, "Closing connection from a superseded attempt");
                handle.close();
            }
            return;
        }

        let handle = match result {
            Ok(handle) => handle,
            Err(e) => {
                let error = match e {
                    TransportError::Timeout(timeout) => StreamError::ConnectionTimeout {
                        url: self.url.clone(),
                        timeout,
                    },
                    other => other.into(),
                };
                warn!("Connection failed: {}", error);
                self.fail(DisconnectReason::NetworkError(error.to_string()), error);
                return;
            }
        };

        dispatcher.reset();
        self.link = Some(handle);
        self.emit(ConnectionEvent::Connected {
            url: self.url.clone(),
            is_reconnection: self.has_been_active,
        });
        self.set_state(SessionState::AuthPending);

        if let Err(error) = self.send_auth() {
            error!("Failed to send auth request: {}", error);
            self.fail(DisconnectReason::NetworkError(error.to_string()), error);
            return;
        }
        self.out.auth.send_replace(AuthStatus::Pending);
        self.auth_deadline = Some(Instant::now() + self.config.auth_timeout);
    }

    fn send_auth(&self) -> StreamResult<()> {
        let t = now_ms();
        let sig = self.config.credentials.sign(&auth_payload(t))?;
        let request = AuthRequest::new(self.session_id, t, self.config.credentials.api_key(), sig);
        debug!(session_id = %self.session_id, "Sending auth request");
        self.send(&request)
    }

    fn on_frame(&mut self, text: &str, dispatcher: &mut Dispatcher) {
        match dispatcher.dispatch(text, self) {
            DispatchOutcome::Handled(_) | DispatchOutcome::Dropped => {}
            DispatchOutcome::Invalid(error) => self.emit(error),
            DispatchOutcome::Escalate { consecutive, error } => {
                error!(consecutive, "Too many malformed messages, forcing reconnect");
                self.fail(DisconnectReason::ProtocolErrors(consecutive), error);
            }
        }
    }

    fn on_closed(&mut self, error: Option<TransportError>) {
        let (reason, error) = match error {
            Some(e) => (DisconnectReason::NetworkError(e.to_string()), StreamError::from(e)),
            None => (
                DisconnectReason::ServerClosed,
                StreamError::Connection("connection closed by server".into()),
            ),
        };
        warn!(state = %self.state, "Connection lost: {}", error);
        self.fail(reason, error);
    }

    fn activate(&mut self) {
        let requests = self.subscriptions.restoration_requests();
        for request in &requests {
            if let Err(e) = self.send(request) {
                warn!("Failed to restore subscription: {}", e);
            }
        }
        if !requests.is_empty() {
            info!(count = requests.len(), "Restored subscriptions");
            self.emit(ConnectionEvent::SubscriptionsRestored {
                count: requests.len(),
            });
        }

        self.set_state(SessionState::Active);
        self.has_been_active = true;
        self.backoff.reset();
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
    }

    fn check_liveness(&mut self) {
        match self.heartbeat.check(Instant::now()) {
            Liveness::Dead(missed) => {
                warn!(missed, "Server heartbeat lost");
                self.fail(DisconnectReason::HeartbeatTimeout, StreamError::Liveness { missed });
            }
            Liveness::Missed(missed) => debug!(missed, "Server heartbeat overdue"),
            Liveness::Healthy | Liveness::Idle => {}
        }
    }

    fn auth_timed_out(&mut self) {
        let timeout = self.config.auth_timeout;
        warn!(?timeout, "No auth response");
        self.fail(DisconnectReason::AuthTimeout, StreamError::AuthTimeout(timeout));
    }

    /// Drop the current connection and decide whether to come back
    fn fail(&mut self, reason: DisconnectReason, error: StreamError) {
        let established = self.state.is_authenticated();
        // The stream itself is suspect, so replace it even on a first connect
        let forced = matches!(
            reason,
            DisconnectReason::SessionIdMismatch | DisconnectReason::ProtocolErrors(_)
        );
        let had_link = self.link.is_some();

        self.teardown();
        if had_link {
            self.emit(ConnectionEvent::Disconnected { reason });
        }
        self.set_state(SessionState::Disconnected);
        self.emit(error.clone());

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(error.clone()));
        }

        if !(established || forced || self.origin == Origin::Reconnect) {
            debug!("Connect attempt failed, leaving retry to the caller");
            return;
        }

        let recoverable = match error {
            StreamError::Authentication { .. } => self.backoff.config().retry_on_auth_failure,
            _ => forced || error.requires_reconnect() || error.is_retryable(),
        };
        if !recoverable {
            warn!("Not reconnecting after: {}", error);
            self.emit(ConnectionEvent::ReconnectFailed {
                attempts: self.backoff.attempt(),
                error,
            });
            return;
        }

        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        match self.backoff.next_attempt() {
            Some((attempt, delay)) => {
                info!(attempt, ?delay, "Reconnecting");
                self.reconnect_at = Some(Instant::now() + delay);
                self.emit(ConnectionEvent::Reconnecting { attempt, delay });
            }
            None => {
                let attempts = self.backoff.attempt();
                let error = StreamError::ReconnectExhausted { attempts };
                error!("{}", error);
                self.emit(ConnectionEvent::ReconnectFailed { attempts, error });
            }
        }
    }

    fn teardown(&mut self) {
        self.epoch += 1;
        if let Some(link) = self.link.take() {
            link.close();
        }
        self.heartbeat.disarm();
        self.auth_deadline = None;
        self.out.book.clear();
        self.out.auth.send_if_modified(|status| {
            if matches!(status, AuthStatus::Pending | AuthStatus::Succeeded) {
                *status = AuthStatus::Unauthenticated;
                true
            } else {
                false
            }
        });
    }

    fn shutdown(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        info!(session_id = %self.session_id, "Disconnecting");

        let had_link = self.link.is_some();
        self.teardown();
        self.reconnect_at = None;
        self.subscriptions.clear();
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(StreamError::SessionClosed));
        }

        if had_link {
            self.emit(ConnectionEvent::Disconnected {
                reason: DisconnectReason::Shutdown,
            });
        }
        self.set_state(SessionState::Closed);
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn set_state(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!(%from, %to, "Session state changed");
        self.out.state.send_replace(to);
        self.emit(ConnectionEvent::StateChanged { from, to });
    }

    fn send<T: Serialize>(&self, message: &T) -> StreamResult<()> {
        let link = self
            .link
            .as_ref()
            .ok_or_else(|| StreamError::Connection("not connected".into()))?;
        let text = serde_json::to_string(message)?;
        link.send(text).map_err(StreamError::from)
    }

    /// Deliver an event if a receiver was ever attached
    fn emit(&self, event: impl Into<Event>) {
        if let Some(events) = &self.events {
            let _ = events.send(event.into());
        }
    }
}

impl MessageHandler for Driver {
    fn on_heartbeat(&mut self, msg: Heartbeat) {
        let now = Instant::now();
        match self.send(&PongMessage::new()) {
            Ok(()) => self.heartbeat.on_pong_sent(now),
            Err(e) => warn!("Failed to answer ping: {}", e),
        }
        if self.heartbeat.is_armed() {
            self.heartbeat.on_ping(now, msg.hp);
        }
        self.emit(MarketEvent::Heartbeat { hp: msg.hp });
    }

    fn on_auth_response(&mut self, msg: AuthResponse) {
        if self.state != SessionState::AuthPending {
            warn!(state = %self.state, "Ignoring unexpected auth response");
            return;
        }

        if !msg.is_success() {
            let message = msg.err.unwrap_or_default();
            error!(code = msg.code, "Authentication failed: {}", message);
            self.out.auth.send_replace(AuthStatus::Failed {
                code: msg.code,
                message: message.clone(),
            });
            self.fail(
                DisconnectReason::AuthRejected { code: msg.code },
                StreamError::Authentication {
                    code: msg.code,
                    message,
                },
            );
            return;
        }

        if Uuid::parse_str(&msg.id).ok() != Some(self.session_id) {
            let error = StreamError::protocol(
                format!("auth response id {} does not match session {}", msg.id, self.session_id),
                None,
            );
            warn!("{}", error);
            self.fail(DisconnectReason::SessionIdMismatch, error);
            return;
        }

        self.auth_deadline = None;
        self.out.auth.send_replace(AuthStatus::Succeeded);
        self.heartbeat.arm(Instant::now());
        self.set_state(SessionState::Authenticated);
        info!(session_id = %self.session_id, "Authenticated");
        self.emit(ConnectionEvent::Authenticated);
        self.activate();
    }

    fn on_book_update(&mut self, msg: BookUpdate) {
        if !self.subscriptions.contains(&Subscription::best_bid_offer(msg.symbol.as_str())) {
            debug!(symbol = %msg.symbol, "Dropping book update for a symbol no longer subscribed");
            return;
        }
        let book = msg.book();
        if book.is_crossed() {
            warn!(symbol = %msg.symbol, ask = book.ask.price, bid = book.bid.price, "Crossed book");
            self.emit(MarketEvent::CrossedBook {
                symbol: msg.symbol.clone(),
                book,
            });
        }
        self.out.book.update(&msg.symbol, book);
        self.emit(MarketEvent::BestBookUpdate {
            symbol: msg.symbol,
            book,
        });
    }

    fn on_disconnect(&mut self, msg: DisconnectMessage) {
        warn!(code = msg.code, reason = %msg.reason, info = %msg.info, "Server sent disconnect");
        let error = StreamError::Connection(format!("server disconnect {}: {}", msg.code, msg.reason));
        self.emit(MarketEvent::ServerDisconnect {
            code: msg.code,
            reason: msg.reason.clone(),
            info: msg.info,
        });
        self.fail(
            DisconnectReason::ServerDisconnect {
                code: msg.code,
                reason: msg.reason,
            },
            error,
        );
    }

    fn on_connected(&mut self, msg: Connected) {
        debug!(connection_type = %msg.connection_type, "Server greeting");
    }

    fn on_ack(&mut self, msg: Ack) {
        if msg.is_success() {
            debug!(m = %msg.m, ch = ?msg.ch, "Request acknowledged");
            self.emit(SubscriptionEvent::Acknowledged { channel: msg.ch });
        } else {
            let reason = msg.err.unwrap_or_default();
            warn!(code = msg.code, ch = ?msg.ch, "Request rejected: {}", reason);
            self.emit(SubscriptionEvent::Rejected {
                channel: msg.ch,
                code: msg.code,
                reason,
            });
        }
    }
}

/// Hand the connection to the driver, then relay its events in order
async fn forward(epoch: u64, connection: Connection, mail: mpsc::UnboundedSender<Mail>) {
    let Connection { handle, mut events } = connection;
    let opened = Mail::Opened {
        epoch,
        result: Ok(handle.clone()),
    };
    if mail.send(opened).is_err() {
        // Driver is gone
        handle.close();
        return;
    }
    drop(handle);

    while let Some(event) = events.recv().await {
        let closed = matches!(event, TransportEvent::Closed(_));
        if mail.send(Mail::Transport { epoch, event }).is_err() || closed {
            return;
        }
    }

    let _ = mail.send(Mail::Transport {
        epoch,
        event: TransportEvent::Closed(Some(TransportError::ConnectionClosed)),
    });
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
