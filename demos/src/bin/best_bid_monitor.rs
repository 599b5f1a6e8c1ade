//! Demo 1: Best Bid/Offer Monitor
//!
//! Showcases: authenticated session, bbo subscription, lock-free book reads
//!
//! Run: cargo run --bin best_bid_monitor -- [--creds <file>] [symbol...]
//!
//! Credentials come from the given `Key:value` file, or from the
//! `ASCENDEX_*` environment variables when no file is given.

use ascend_auth::Credentials;
use ascend_types::Channel;
use ascend_ws::{HeartbeatConfig, Session, SessionConfig};
use colored::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn load_credentials(path: Option<&str>) -> Result<Credentials, ascend_auth::AuthError> {
    match path {
        Some(path) => Credentials::from_file(path),
        None => Credentials::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let path = match args.iter().position(|arg| arg == "--creds") {
        Some(i) if i + 1 < args.len() => {
            let path = args.remove(i + 1);
            args.remove(i);
            Some(path)
        }
        _ => None,
    };
    let mut symbols = args;
    if symbols.is_empty() {
        symbols = vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()];
    }

    println!("{}", "═".repeat(60).cyan());
    println!("{}", "  BEST BID/OFFER MONITOR".cyan().bold());
    println!("{}", "  AscendEX pro stream".cyan());
    println!("{}", "═".repeat(60).cyan());
    println!();

    let creds = load_credentials(path.as_deref())?;
    let config = SessionConfig::new(creds)
        .with_heartbeat(HeartbeatConfig::new().with_interval(Duration::from_secs(15)));
    let session = Session::start(config)?;

    for symbol in &symbols {
        session.subscribe(Channel::BestBidOffer, symbol.as_str()).await?;
    }
    session.connect().await?;

    println!("{} Authenticated as session {}", "✓".green(), session.session_id());
    println!("{} Streaming {}...\n", "✓".green(), symbols.join(", "));

    let book = session.book();
    let mut last_version = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_millis(250)) => {}
        }

        let snapshot = book.snapshot();
        if snapshot.version == last_version {
            continue;
        }
        last_version = snapshot.version;

        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
        for symbol in &symbols {
            match snapshot.get(symbol) {
                Some(best) => {
                    let spread = best.spread().map(|s| format!("{:.4}", s)).unwrap_or_else(|| "-".into());
                    let line = format!(
                        "  {} {:<10} {} {:>12.4} x {:<10.4} {} {:>12.4} x {:<10.4} {} {}",
                        format!("[{}]", timestamp).dimmed(),
                        symbol.cyan(),
                        "BID".yellow(),
                        best.bid.price,
                        best.bid.amount,
                        "ASK".yellow(),
                        best.ask.price,
                        best.ask.amount,
                        "SPREAD".green(),
                        spread
                    );
                    if best.is_crossed() {
                        println!("{} {}", line, "CROSSED".red().bold());
                    } else {
                        println!("{}", line);
                    }
                }
                None => println!("  {} {:<10} {}", format!("[{}]", timestamp).dimmed(), symbol.cyan(), "waiting...".dimmed()),
            }
        }
    }

    println!();
    println!("{} Disconnecting", "●".yellow());
    session.disconnect().await;

    Ok(())
}
