//! Demo 2: Auto-Reconnect Demo
//!
//! Showcases: session lifecycle events, exponential backoff, resubscription
//!
//! Run: cargo run --bin reconnect_demo
//!
//! Pull the network cable (or suspend the machine) while it runs to watch the
//! session recover.

use ascend_auth::Credentials;
use ascend_types::Channel;
use ascend_ws::{
    ConnectionEvent, Event, HeartbeatConfig, MarketEvent, ReconnectConfig, Session, SessionConfig,
};
use colored::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("{}", "═".repeat(65).cyan());
    println!("{}", "  AUTO-RECONNECT DEMO".cyan().bold());
    println!("{}", "  AscendEX pro stream - Resilient Session Handling".cyan());
    println!("{}", "═".repeat(65).cyan());
    println!();

    let reconnect = ReconnectConfig::new();
    println!("{}", "  RECONNECTION CONFIGURATION".white().bold());
    println!("  {}", "─".repeat(50));
    println!("  Base Delay:         {:?}", reconnect.base_delay);
    println!("  Max Delay:          {:?}", reconnect.max_delay);
    println!("  Backoff Multiplier: {}x", reconnect.multiplier);
    println!("  Jitter:             ±{:.0}%", reconnect.jitter * 100.0);
    println!();

    println!("{}", "  EXPONENTIAL BACKOFF PROGRESSION".white().bold());
    println!("  {}", "─".repeat(50));
    for attempt in 1..=8 {
        let delay = reconnect.delay_for_attempt(attempt);
        let bar_len = (delay.as_millis() / 750).min(40) as usize;
        println!(
            "  Attempt {:>2}: {:>6} ms  {}",
            attempt,
            delay.as_millis(),
            "█".repeat(bar_len).yellow()
        );
    }
    println!();

    println!("{}", "  LIVE SESSION".white().bold());
    println!("  {}", "─".repeat(50));

    let config = SessionConfig::new(Credentials::from_env()?)
        .with_heartbeat(HeartbeatConfig::new().with_interval(Duration::from_secs(15)))
        .with_reconnect(reconnect);
    let session = Session::start(config)?;
    let mut events = session.take_event_receiver().ok_or("events already taken")?;

    session.subscribe(Channel::BestBidOffer, "BTC/USDT").await?;
    session.connect().await?;
    tracing::info!(session_id = %session.session_id(), url = %session.url(), "session active");

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        let timestamp = format!("[{}]", chrono::Local::now().format("%H:%M:%S%.3f")).dimmed();

        match event {
            Event::Connection(ConnectionEvent::StateChanged { from, to }) => {
                println!("  {} {} {} → {}", timestamp, "●".blue(), from, to.to_string().bold());
            }
            Event::Connection(ConnectionEvent::Connected { is_reconnection, .. }) => {
                let label = if is_reconnection { "Reconnected" } else { "Connected" };
                println!("  {} {} {}", timestamp, "●".green(), label.green());
            }
            Event::Connection(ConnectionEvent::Disconnected { reason }) => {
                println!("  {} {} Disconnected: {:?}", timestamp, "●".red(), reason);
            }
            Event::Connection(ConnectionEvent::Reconnecting { attempt, delay }) => {
                println!(
                    "  {} {} Reconnect attempt {} in {:?}",
                    timestamp,
                    "●".yellow(),
                    attempt,
                    delay
                );
            }
            Event::Connection(ConnectionEvent::SubscriptionsRestored { count }) => {
                println!("  {} {} Restored {} subscription(s)", timestamp, "●".green(), count);
            }
            Event::Connection(ConnectionEvent::ReconnectFailed { attempts, error }) => {
                println!(
                    "  {} {} Giving up after {} attempts: {}",
                    timestamp,
                    "●".red().bold(),
                    attempts,
                    error
                );
                break;
            }
            Event::Market(MarketEvent::Heartbeat { hp }) => {
                println!("  {} {} ping (hp {})", timestamp, "♥".magenta(), hp);
            }
            Event::Error(error) => {
                println!("  {} {} {}", timestamp, "!".red(), error.to_string().dimmed());
            }
            _ => {}
        }
    }

    println!();
    session.disconnect().await;
    println!("  {} Session closed", "Note:".dimmed());

    Ok(())
}
