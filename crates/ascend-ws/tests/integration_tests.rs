//! Integration tests against the live AscendEX pro stream
//!
//! These tests make real authenticated WebSocket connections and need account
//! credentials in `ASCENDEX_HOST`, `ASCENDEX_GROUP`, `ASCENDEX_API_KEY` and
//! `ASCENDEX_SECRET`.
//! Run with: cargo test -p ascend-ws --test integration_tests -- --ignored
//!
//! Note: These tests are ignored by default to avoid making network calls during
//! normal test runs.

use ascend_auth::Credentials;
use ascend_types::Channel;
use ascend_ws::{Event, HeartbeatConfig, MarketEvent, Session, SessionConfig, SessionState};
use std::time::Duration;
use tokio::time::timeout;

fn session() -> Session {
    let creds = Credentials::from_env().expect("ASCENDEX_* variables must be set");
    // The exchange pings roughly every 15 seconds
    let config = SessionConfig::new(creds)
        .with_heartbeat(HeartbeatConfig::new().with_interval(Duration::from_secs(15)));
    Session::start(config).expect("valid credentials")
}

/// Test that we can connect and authenticate
#[tokio::test]
#[ignore = "Makes real WebSocket connection"]
async fn test_connect_and_authenticate() {
    let session = session();

    timeout(Duration::from_secs(15), session.connect())
        .await
        .expect("Connection timed out")
        .expect("Should authenticate");

    assert_eq!(session.state(), SessionState::Active);
    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Closed);
}

/// Test that best bid/offer updates land in the book view
#[tokio::test]
#[ignore = "Makes real WebSocket connection"]
async fn test_best_bid_offer_updates() {
    let session = session();
    let mut events = session.take_event_receiver().expect("Should have receiver");

    session.subscribe(Channel::BestBidOffer, "BTC/USDT").await.unwrap();
    session.connect().await.expect("Should authenticate");

    let received = timeout(Duration::from_secs(30), async {
        while let Some(event) = events.recv().await {
            if let Event::Market(MarketEvent::BestBookUpdate { symbol, .. }) = event {
                if symbol == "BTC/USDT" {
                    return true;
                }
            }
        }
        false
    })
    .await;

    assert!(received.is_ok(), "Timed out waiting for bbo update");
    assert!(received.unwrap(), "Should have received a bbo update");

    let book = session.book().get("BTC/USDT").expect("Book should be populated");
    assert!(book.ask.price > 0.0);
    assert!(book.bid.price > 0.0);

    session.disconnect().await;
}

/// Test that server pings arrive and are answered
#[tokio::test]
#[ignore = "Makes real WebSocket connection"]
async fn test_heartbeat() {
    let session = session();
    let mut events = session.take_event_receiver().expect("Should have receiver");
    session.connect().await.expect("Should authenticate");

    let heartbeat = timeout(Duration::from_secs(60), async {
        while let Some(event) = events.recv().await {
            if let Event::Market(MarketEvent::Heartbeat { .. }) = event {
                return true;
            }
        }
        false
    })
    .await;

    assert!(heartbeat.is_ok(), "Timed out waiting for server ping");
    assert_eq!(session.state(), SessionState::Active);

    session.disconnect().await;
}
