//! Session, subscription and market events

use crate::session::SessionState;
use crate::subscription::Subscription;
use ascend_types::{BestOrderBook, StreamError};
use std::time::Duration;

/// Reason for disconnection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Socket closed without an error
    ServerClosed,
    /// Server sent a disconnect message
    ServerDisconnect {
        /// Disconnect code
        code: i64,
        /// Reason text
        reason: String,
    },
    /// Network error occurred
    NetworkError(String),
    /// Missed server heartbeats
    HeartbeatTimeout,
    /// Too many malformed messages in a row
    ProtocolErrors(u32),
    /// Auth response carried a different session id
    SessionIdMismatch,
    /// Server rejected the credentials
    AuthRejected {
        /// Server error code
        code: i64,
    },
    /// No auth response in time
    AuthTimeout,
    /// Client requested shutdown
    Shutdown,
}

/// Connection lifecycle events
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Session state machine moved
    StateChanged {
        /// Previous state
        from: SessionState,
        /// New state
        to: SessionState,
    },
    /// Socket opened, auth request sent
    Connected {
        /// Endpoint URL
        url: String,
        /// Whether this is a reconnection
        is_reconnection: bool,
    },
    /// Server accepted the credentials
    Authenticated,
    /// Connection was lost
    Disconnected {
        /// Reason for disconnection
        reason: DisconnectReason,
    },
    /// Reconnection scheduled
    Reconnecting {
        /// Current attempt number (1-indexed)
        attempt: u32,
        /// Delay before this attempt
        delay: Duration,
    },
    /// Reconnection attempts exhausted. No further automatic attempts.
    ReconnectFailed {
        /// Attempts made
        attempts: u32,
        /// Final error
        error: StreamError,
    },
    /// Retained subscriptions re-sent after authentication
    SubscriptionsRestored {
        /// Number of subscriptions restored
        count: usize,
    },
}

/// Subscription-specific events
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// Subscribe request sent
    Requested(Subscription),
    /// Server acknowledged a request
    Acknowledged {
        /// Channel string from the ack, if any
        channel: Option<String>,
    },
    /// Server rejected a request
    Rejected {
        /// Channel string from the ack, if any
        channel: Option<String>,
        /// Error code
        code: i64,
        /// Rejection reason
        reason: String,
    },
    /// Unsubscribe request sent
    Unsubscribed(Subscription),
}

/// Market data events
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    /// Best bid/offer changed
    BestBookUpdate {
        /// Trading pair symbol
        symbol: String,
        /// New best book
        book: BestOrderBook,
    },
    /// Update had ask below bid; stored anyway
    CrossedBook {
        /// Trading pair symbol
        symbol: String,
        /// Offending book
        book: BestOrderBook,
    },
    /// Server ping answered
    Heartbeat {
        /// Health indicator
        hp: i64,
    },
    /// Server announced it is dropping the connection
    ServerDisconnect {
        /// Disconnect code
        code: i64,
        /// Reason text
        reason: String,
        /// Extra detail
        info: String,
    },
}

/// Combined event type for event streams
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Connection-related event
    Connection(ConnectionEvent),
    /// Subscription-related event
    Subscription(SubscriptionEvent),
    /// Market data event
    Market(MarketEvent),
    /// Error handled internally, reported for observability
    Error(StreamError),
}

impl From<ConnectionEvent> for Event {
    fn from(event: ConnectionEvent) -> Self {
        Event::Connection(event)
    }
}

impl From<SubscriptionEvent> for Event {
    fn from(event: SubscriptionEvent) -> Self {
        Event::Subscription(event)
    }
}

impl From<MarketEvent> for Event {
    fn from(event: MarketEvent) -> Self {
        Event::Market(event)
    }
}

impl From<StreamError> for Event {
    fn from(error: StreamError) -> Self {
        Event::Error(error)
    }
}
