//! Outbound request messages

use crate::Channel;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// Session Requests
// ============================================================================

/// Authentication request, sent immediately after the socket opens
#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest {
    /// Always "auth"
    pub op: &'static str,
    /// Client session id, echoed by the server
    pub id: Uuid,
    /// UTC timestamp in milliseconds used in the signed payload
    pub t: i64,
    /// API key
    pub key: String,
    /// Base64 HMAC-SHA256 signature of `"<t>stream"`
    pub sig: String,
}

impl AuthRequest {
    /// Create a new auth request
    pub fn new(id: Uuid, t: i64, key: impl Into<String>, sig: impl Into<String>) -> Self {
        Self {
            op: "auth",
            id,
            t,
            key: key.into(),
            sig: sig.into(),
        }
    }
}

/// Reply to a server heartbeat
#[derive(Debug, Clone, Serialize)]
pub struct PongMessage {
    /// Always "pong"
    pub op: &'static str,
}

impl PongMessage {
    /// Create a new pong
    pub fn new() -> Self {
        Self { op: "pong" }
    }
}

impl Default for PongMessage {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Subscription Requests
// ============================================================================

/// Subscribe or unsubscribe action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscribeAction {
    /// Start streaming a channel
    Subscribe,
    /// Stop streaming a channel
    Unsubscribe,
}

/// Channel and symbol targeted by a subscription request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelArgs {
    /// Channel to (un)subscribe
    pub channel: Channel,
    /// Trading pair symbol
    pub symbol: String,
}

/// Subscribe/unsubscribe request message
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    /// Always "req"
    pub op: &'static str,
    /// Subscribe or unsubscribe
    pub action: SubscribeAction,
    /// Target channel and symbol
    pub args: ChannelArgs,
}

impl SubscribeRequest {
    /// Create a subscribe request
    pub fn subscribe(channel: Channel, symbol: impl Into<String>) -> Self {
        Self::with_action(SubscribeAction::Subscribe, channel, symbol)
    }

    /// Create an unsubscribe request
    pub fn unsubscribe(channel: Channel, symbol: impl Into<String>) -> Self {
        Self::with_action(SubscribeAction::Unsubscribe, channel, symbol)
    }

    fn with_action(action: SubscribeAction, channel: Channel, symbol: impl Into<String>) -> Self {
        Self {
            op: "req",
            action,
            args: ChannelArgs {
                channel,
                symbol: symbol.into(),
            },
        }
    }
}

// ============================================================================
// Order Requests
// ============================================================================

/// Arguments for cancel-all
#[derive(Debug, Clone, Serialize)]
pub struct CancelAllArgs {
    /// Request time in milliseconds
    pub time: i64,
    /// Restrict to one symbol
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Cancel every open order, optionally for one symbol
#[derive(Debug, Clone, Serialize)]
pub struct CancelAllRequest {
    /// Always "req"
    pub op: &'static str,
    /// Always "cancel-all"
    pub action: &'static str,
    /// Arguments
    pub args: CancelAllArgs,
}

impl CancelAllRequest {
    /// Create a cancel-all request
    pub fn new(time: i64, symbol: Option<String>) -> Self {
        Self {
            op: "req",
            action: "cancel-all",
            args: CancelAllArgs { time, symbol },
        }
    }
}

/// Arguments for cancel-order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderArgs {
    /// Request time in milliseconds
    pub time: i64,
    /// Id of this cancel request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coid: Option<Uuid>,
    /// Server-assigned id of the order to cancel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orig_coid: Option<Uuid>,
    /// Symbol of the order to cancel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Cancel a single order
#[derive(Debug, Clone, Serialize)]
pub struct CancelOrderRequest {
    /// Always "req"
    pub op: &'static str,
    /// Always "cancel-order"
    pub action: &'static str,
    /// Arguments
    pub args: CancelOrderArgs,
}

impl CancelOrderRequest {
    /// Create a cancel-order request with a fresh request id
    pub fn new(time: i64, symbol: impl Into<String>, orig_coid: Uuid) -> Self {
        Self {
            op: "req",
            action: "cancel-order",
            args: CancelOrderArgs {
                time,
                coid: Some(Uuid::new_v4()),
                orig_coid: Some(orig_coid),
                symbol: Some(symbol.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_auth_request_shape() {
        let id = Uuid::nil();
        let req = AuthRequest::new(id, 1_700_000_000_000, "key", "c2ln");
        let value: Value = serde_json::to_value(&req).unwrap();

        assert_eq!(
            value,
            json!({
                "op": "auth",
                "id": "00000000-0000-0000-0000-000000000000",
                "t": 1_700_000_000_000i64,
                "key": "key",
                "sig": "c2ln"
            })
        );
    }

    #[test]
    fn test_pong_shape() {
        assert_eq!(serde_json::to_string(&PongMessage::new()).unwrap(), r#"{"op":"pong"}"#);
    }

    #[test]
    fn test_subscribe_shape() {
        let value = serde_json::to_value(SubscribeRequest::subscribe(Channel::Depth, "BTC/USDT")).unwrap();
        assert_eq!(
            value,
            json!({"op": "req", "action": "subscribe", "args": {"channel": "depth", "symbol": "BTC/USDT"}})
        );

        let value =
            serde_json::to_value(SubscribeRequest::unsubscribe(Channel::BestBidOffer, "ETH/USDT")).unwrap();
        assert_eq!(value["action"], "unsubscribe");
        assert_eq!(value["args"]["channel"], "bbo");
    }

    #[test]
    fn test_cancel_shapes() {
        let all = serde_json::to_value(CancelAllRequest::new(42, None)).unwrap();
        assert_eq!(all, json!({"op": "req", "action": "cancel-all", "args": {"time": 42}}));

        let target = Uuid::new_v4();
        let one = serde_json::to_value(CancelOrderRequest::new(42, "BTC/USDT", target)).unwrap();
        assert_eq!(one["action"], "cancel-order");
        assert_eq!(one["args"]["origCoid"], target.to_string());
        assert_eq!(one["args"]["symbol"], "BTC/USDT");
        assert!(one["args"]["coid"].is_string());
    }
}
