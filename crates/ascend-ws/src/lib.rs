//! Resilient WebSocket session for the AscendEX pro stream
//!
//! This crate keeps one authenticated streaming session alive across network
//! failures and exposes the latest best bid/offer per symbol.
//!
//! # Features
//!
//! - HMAC signed auth handshake on every (re)connect
//! - Heartbeat answering and dead-connection detection
//! - Automatic reconnection with exponential backoff
//! - Retained subscriptions restored after reconnect
//! - Concurrent, non-blocking reads of the best book per symbol
//! - Event-driven architecture with async streams
//!
//! # Example
//!
//! ```no_run
//! use ascend_auth::Credentials;
//! use ascend_types::Channel;
//! use ascend_ws::{Event, MarketEvent, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::start(SessionConfig::new(Credentials::from_env()?))?;
//!     let mut events = session.take_event_receiver().unwrap();
//!
//!     session.subscribe(Channel::BestBidOffer, "BTC/USDT").await?;
//!     session.connect().await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let Event::Market(MarketEvent::BestBookUpdate { symbol, book }) = event {
//!             println!("{}: {:?}", symbol, book);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod book_view;
pub mod dispatcher;
pub mod events;
pub mod heartbeat;
pub mod reconnect;
pub mod session;
pub mod subscription;
pub mod transport;

// Re-export main types
pub use book_view::{BookSnapshot, BookView};
pub use dispatcher::{DispatchOutcome, Dispatcher, MessageHandler};
pub use events::{ConnectionEvent, DisconnectReason, Event, MarketEvent, SubscriptionEvent};
pub use heartbeat::{HeartbeatConfig, HeartbeatMonitor, Liveness};
pub use reconnect::{Backoff, ReconnectConfig};
pub use session::{AuthStatus, Session, SessionConfig, SessionState};
pub use subscription::{Subscription, SubscriptionSet};
pub use transport::{Connection, Connector, TransportError, TransportEvent, TransportHandle, WsConnector};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::{MockConnector, MockLink, MockServer};
