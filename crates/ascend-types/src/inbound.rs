//! Inbound message classification and decoding
//!
//! Every server frame carries an `m` discriminator. [`classify`] maps it to a
//! closed set of [`MessageKind`]s before any payload decoding happens, and
//! [`InboundMessage::parse`] decodes the payload for that kind.

use crate::{BestOrderBook, Order, StreamError, StreamResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Closed set of inbound message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Server ping
    Heartbeat,
    /// Response to the auth request
    AuthResponse,
    /// Best bid/offer update for a symbol
    BookUpdate,
    /// Server is dropping the connection
    Disconnect,
    /// Greeting sent when the socket opens
    Connected,
    /// Acknowledgement of a subscribe/unsubscribe/order request
    Ack,
    /// Anything else
    Unrecognized,
}

/// Classify a decoded envelope by its `m` field
pub fn classify(envelope: &Value) -> MessageKind {
    match envelope.get("m").and_then(Value::as_str) {
        Some("ping") => MessageKind::Heartbeat,
        Some("auth") => MessageKind::AuthResponse,
        Some("bbo") => MessageKind::BookUpdate,
        Some("disconnect") => MessageKind::Disconnect,
        Some("connected") => MessageKind::Connected,
        Some("sub") | Some("unsub") | Some("req") => MessageKind::Ack,
        _ => MessageKind::Unrecognized,
    }
}

/// Server heartbeat: `{"m":"ping","hp":3}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Heartbeat {
    /// Health point indicator
    #[serde(default)]
    pub hp: i64,
}

/// Auth response: `{"m":"auth","id":"...","code":0}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthResponse {
    /// Echoed session id
    pub id: String,
    /// 0 on success
    pub code: i64,
    /// Error message on failure
    #[serde(default)]
    pub err: Option<String>,
}

impl AuthResponse {
    /// Returns true if the server accepted the credentials
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Server initiated disconnect
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DisconnectMessage {
    /// Disconnect code
    #[serde(default)]
    pub code: i64,
    /// Short reason
    #[serde(default)]
    pub reason: String,
    /// Extra detail
    #[serde(default)]
    pub info: String,
}

/// Socket greeting: `{"m":"connected","type":"unauth"}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Connected {
    /// Connection type reported by the server
    #[serde(rename = "type", default)]
    pub connection_type: String,
}

/// Request acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Ack {
    /// `sub`, `unsub` or `req`
    pub m: String,
    /// Request id, if the request carried one
    #[serde(default)]
    pub id: Option<String>,
    /// Channel the acknowledgement refers to
    #[serde(default)]
    pub ch: Option<String>,
    /// 0 on success
    #[serde(default)]
    pub code: i64,
    /// Error message on rejection
    #[serde(default)]
    pub err: Option<String>,
}

impl Ack {
    /// Returns true if the request was accepted
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Payload of a best bid/offer update
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookData {
    /// Server timestamp in milliseconds
    #[serde(default)]
    pub ts: Option<i64>,
    /// Best ask
    pub ask: Order,
    /// Best bid
    pub bid: Order,
}

/// Best bid/offer update: `{"m":"bbo","symbol":"BTC/USDT","data":{"ask":{..},"bid":{..}}}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookUpdate {
    /// Symbol the update belongs to
    pub symbol: String,
    /// Top of book
    pub data: BookData,
}

impl BookUpdate {
    /// The best book carried by this update
    pub fn book(&self) -> BestOrderBook {
        BestOrderBook::new(self.data.ask, self.data.bid)
    }
}

/// Parsed inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Server ping
    Heartbeat(Heartbeat),
    /// Auth response
    AuthResponse(AuthResponse),
    /// Best bid/offer update
    BookUpdate(BookUpdate),
    /// Server disconnect notice
    Disconnect(DisconnectMessage),
    /// Socket greeting
    Connected(Connected),
    /// Request acknowledgement
    Ack(Ack),
    /// Unknown discriminator (the `m` value, if any)
    Unrecognized(Option<String>),
}

impl InboundMessage {
    /// Parse a raw text frame
    pub fn parse(text: &str) -> StreamResult<Self> {
        let envelope: Value = serde_json::from_str(text)
            .map_err(|e| StreamError::protocol(format!("invalid JSON: {}", e), Some(text)))?;

        let message = match classify(&envelope) {
            MessageKind::Heartbeat => Self::Heartbeat(decode(envelope, text)?),
            MessageKind::AuthResponse => Self::AuthResponse(decode(envelope, text)?),
            MessageKind::BookUpdate => Self::BookUpdate(decode(envelope, text)?),
            MessageKind::Disconnect => Self::Disconnect(decode(envelope, text)?),
            MessageKind::Connected => Self::Connected(decode(envelope, text)?),
            MessageKind::Ack => Self::Ack(decode(envelope, text)?),
            MessageKind::Unrecognized => Self::Unrecognized(
                envelope.get("m").and_then(Value::as_str).map(str::to_string),
            ),
        };

        Ok(message)
    }

    /// The kind of this message
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Heartbeat(_) => MessageKind::Heartbeat,
            Self::AuthResponse(_) => MessageKind::AuthResponse,
            Self::BookUpdate(_) => MessageKind::BookUpdate,
            Self::Disconnect(_) => MessageKind::Disconnect,
            Self::Connected(_) => MessageKind::Connected,
            Self::Ack(_) => MessageKind::Ack,
            Self::Unrecognized(_) => MessageKind::Unrecognized,
        }
    }
}

fn decode<T: DeserializeOwned>(envelope: Value, raw: &str) -> StreamResult<T> {
    serde_json::from_value(envelope).map_err(|e| StreamError::protocol(e.to_string(), Some(raw)))
}
