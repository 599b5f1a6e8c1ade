//! Inbound frame routing
//!
//! Decodes each frame into an [`InboundMessage`] and hands it to the matching
//! [`MessageHandler`] callback. Unknown kinds are logged and dropped. Decode
//! failures are counted; once `threshold` of them arrive back to back the
//! caller is told to escalate.

use ascend_types::{
    Ack, AuthResponse, BookUpdate, Connected, DisconnectMessage, Heartbeat, InboundMessage,
    MessageKind, StreamError,
};
use tracing::{debug, warn};

/// Default number of consecutive protocol errors before escalating
pub const DEFAULT_PROTOCOL_ERROR_THRESHOLD: u32 = 10;

/// Callbacks for each decoded message kind
pub trait MessageHandler {
    /// Server ping
    fn on_heartbeat(&mut self, msg: Heartbeat);
    /// Auth response
    fn on_auth_response(&mut self, msg: AuthResponse);
    /// Best bid/offer update
    fn on_book_update(&mut self, msg: BookUpdate);
    /// Server disconnect notice
    fn on_disconnect(&mut self, msg: DisconnectMessage);
    /// Socket greeting
    fn on_connected(&mut self, _msg: Connected) {}
    /// Request acknowledgement
    fn on_ack(&mut self, _msg: Ack) {}
}

/// What happened to one frame
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Routed to a handler callback
    Handled(MessageKind),
    /// Unknown discriminator, dropped
    Dropped,
    /// Could not decode, dropped
    Invalid(StreamError),
    /// Could not decode, and the consecutive error threshold was reached
    Escalate {
        /// Consecutive failures so far
        consecutive: u32,
        /// Latest failure
        error: StreamError,
    },
}

/// Routes frames and tracks protocol error streaks
#[derive(Debug, Clone)]
pub struct Dispatcher {
    threshold: u32,
    consecutive_errors: u32,
    total_errors: u64,
    dropped: u64,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PROTOCOL_ERROR_THRESHOLD)
    }
}

impl Dispatcher {
    /// Create a dispatcher that escalates after `threshold` consecutive errors
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_errors: 0,
            total_errors: 0,
            dropped: 0,
        }
    }

    /// Decode `raw` and route it to `handler`
    pub fn dispatch<H: MessageHandler + ?Sized>(&mut self, raw: &str, handler: &mut H) -> DispatchOutcome {
        let message = match InboundMessage::parse(raw) {
            Ok(message) => message,
            Err(error) => return self.record_error(error),
        };

        let kind = message.kind();
        match message {
            InboundMessage::Unrecognized(tag) => {
                self.dropped += 1;
                self.consecutive_errors = 0;
                debug!(tag = ?tag, "Dropping unrecognized message");
                return DispatchOutcome::Dropped;
            }
            InboundMessage::Heartbeat(msg) => handler.on_heartbeat(msg),
            InboundMessage::AuthResponse(msg) => handler.on_auth_response(msg),
            InboundMessage::BookUpdate(msg) => handler.on_book_update(msg),
            InboundMessage::Disconnect(msg) => handler.on_disconnect(msg),
            InboundMessage::Connected(msg) => handler.on_connected(msg),
            InboundMessage::Ack(msg) => handler.on_ack(msg),
        }

        self.consecutive_errors = 0;
        DispatchOutcome::Handled(kind)
    }

    fn record_error(&mut self, error: StreamError) -> DispatchOutcome {
        self.consecutive_errors += 1;
        self.total_errors += 1;
        warn!(
            consecutive = self.consecutive_errors,
            "Dropping malformed message: {}", error
        );

        if self.consecutive_errors >= self.threshold {
            DispatchOutcome::Escalate {
                consecutive: self.consecutive_errors,
                error,
            }
        } else {
            DispatchOutcome::Invalid(error)
        }
    }

    /// Forget the current error streak (new connection)
    pub fn reset(&mut self) {
        self.consecutive_errors = 0;
    }

    /// Current error streak
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Malformed frames seen in total
    pub fn total_errors(&self) -> u64 {
        self.total_errors
    }

    /// Unrecognized frames dropped in total
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
