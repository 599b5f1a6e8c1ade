//! Server heartbeat liveness tracking
//!
//! The server pings on its own cadence and the client answers each ping with a
//! pong. The configured interval is a floor: once two pings have been seen,
//! the spacing between them is used when it is longer. The monitor only keeps
//! timestamps and counts; the session decides what to do with a
//! [`Liveness`] verdict.

use std::time::Duration;
use tokio::time::Instant;

/// Heartbeat expectations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Expected time between server pings, until the server's own spacing is known
    pub interval: Duration,
    /// Tolerance added before a ping counts as missed
    pub slack: Duration,
    /// Consecutive missed pings that mean the connection is dead
    pub max_missed: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            slack: Duration::from_millis(250),
            max_missed: 3,
        }
    }
}

impl HeartbeatConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set expected ping interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set slack
    pub fn with_slack(mut self, slack: Duration) -> Self {
        self.slack = slack;
        self
    }

    /// Set the dead-connection threshold
    pub fn with_max_missed(mut self, max_missed: u32) -> Self {
        self.max_missed = max_missed.max(1);
        self
    }

    /// How often the session should evaluate liveness
    pub fn check_period(&self) -> Duration {
        (self.interval / 4).max(Duration::from_millis(10))
    }
}

/// Liveness verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Not tracking (no authenticated connection)
    Idle,
    /// Pings arriving on time
    Healthy,
    /// Some pings missed, below the threshold
    Missed(u32),
    /// Threshold reached
    Dead(u32),
}

/// Tracks ping/pong timing for one connection
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    last_received: Option<Instant>,
    last_ping: Option<Instant>,
    observed: Option<Duration>,
    last_sent: Option<Instant>,
    consecutive_missed: u32,
    last_hp: Option<i64>,
}

impl HeartbeatMonitor {
    /// Create an idle monitor
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            last_received: None,
            last_ping: None,
            observed: None,
            last_sent: None,
            consecutive_missed: 0,
            last_hp: None,
        }
    }

    /// Expectations in use
    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    /// Start tracking, treating `now` as the last ping
    pub fn arm(&mut self, now: Instant) {
        self.last_received = Some(now);
        self.consecutive_missed = 0;
    }

    /// Stop tracking
    pub fn disarm(&mut self) {
        self.last_received = None;
        self.last_ping = None;
        self.observed = None;
        self.last_sent = None;
        self.consecutive_missed = 0;
        self.last_hp = None;
    }

    /// Returns true while tracking
    pub fn is_armed(&self) -> bool {
        self.last_received.is_some()
    }

    /// Record a server ping
    pub fn on_ping(&mut self, now: Instant, hp: i64) {
        if let Some(prev) = self.last_ping {
            self.observed = Some(now.saturating_duration_since(prev));
        }
        self.last_ping = Some(now);
        self.last_received = Some(now);
        self.consecutive_missed = 0;
        self.last_hp = Some(hp);
    }

    /// Record our pong
    pub fn on_pong_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }

    /// Evaluate liveness at `now`
    pub fn check(&mut self, now: Instant) -> Liveness {
        let Some(last) = self.last_received else {
            return Liveness::Idle;
        };

        let overdue = now.saturating_duration_since(last).saturating_sub(self.config.slack);
        let missed = (overdue.as_nanos() / self.expected_interval().as_nanos().max(1)) as u32;
        self.consecutive_missed = missed;

        if missed >= self.config.max_missed {
            Liveness::Dead(missed)
        } else if missed > 0 {
            Liveness::Missed(missed)
        } else {
            Liveness::Healthy
        }
    }

    /// Interval used for the next check
    pub fn expected_interval(&self) -> Duration {
        match self.observed {
            Some(observed) => observed.max(self.config.interval),
            None => self.config.interval,
        }
    }

    /// Last ping time
    pub fn last_received(&self) -> Option<Instant> {
        self.last_received
    }

    /// Last pong time
    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    /// Missed count from the latest check
    pub fn consecutive_missed(&self) -> u32 {
        self.consecutive_missed
    }

    /// Health indicator carried by the latest ping
    pub fn last_hp(&self) -> Option<i64> {
        self.last_hp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> HeartbeatMonitor {
        HeartbeatMonitor::new(
            HeartbeatConfig::new()
                .with_interval(Duration::from_secs(1))
                .with_slack(Duration::from_millis(200)),
        )
    }

    #[test]
    fn test_idle_until_armed() {
        let mut hb = monitor();
        assert_eq!(hb.check(Instant::now()), Liveness::Idle);
        assert!(!hb.is_armed());
    }

    #[test]
    fn test_missed_then_dead() {
        let mut hb = monitor();
        let start = Instant::now();
        hb.arm(start);

        assert_eq!(hb.check(start + Duration::from_millis(1100)), Liveness::Healthy);
        assert_eq!(hb.check(start + Duration::from_millis(1300)), Liveness::Missed(1));
        assert_eq!(hb.check(start + Duration::from_millis(2300)), Liveness::Missed(2));
        assert_eq!(hb.check(start + Duration::from_millis(3200)), Liveness::Dead(3));
        assert_eq!(hb.consecutive_missed(), 3);
    }

    #[test]
    fn test_ping_resets() {
        let mut hb = monitor();
        let start = Instant::now();
        hb.arm(start);

        assert_eq!(hb.check(start + Duration::from_millis(2500)), Liveness::Missed(2));

        hb.on_ping(start + Duration::from_millis(2600), 7);
        assert_eq!(hb.check(start + Duration::from_millis(3000)), Liveness::Healthy);
        assert_eq!(hb.consecutive_missed(), 0);
        assert_eq!(hb.last_hp(), Some(7));
    }

    #[test]
    fn test_learns_slower_server_cadence() {
        let mut hb = monitor();
        let start = Instant::now();
        hb.arm(start);
        hb.on_ping(start + Duration::from_millis(900), 1);
        assert_eq!(hb.expected_interval(), Duration::from_secs(1));

        // Server slows down to one ping every 3s
        let second = start + Duration::from_millis(3900);
        hb.on_ping(second, 1);
        assert_eq!(hb.expected_interval(), Duration::from_secs(3));

        // Would be Dead(5) against the configured 1s
        assert_eq!(hb.check(second + Duration::from_millis(5500)), Liveness::Missed(1));
        assert_eq!(hb.check(second + Duration::from_millis(9300)), Liveness::Dead(3));
    }

    #[test]
    fn test_faster_cadence_keeps_configured_floor() {
        let mut hb = monitor();
        let start = Instant::now();
        hb.arm(start);
        hb.on_ping(start + Duration::from_millis(100), 1);
        hb.on_ping(start + Duration::from_millis(200), 1);
        assert_eq!(hb.expected_interval(), Duration::from_secs(1));

        hb.disarm();
        assert_eq!(hb.expected_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_disarm() {
        let mut hb = monitor();
        let start = Instant::now();
        hb.arm(start);
        hb.on_pong_sent(start);
        hb.disarm();

        assert_eq!(hb.check(start + Duration::from_secs(60)), Liveness::Idle);
        assert!(hb.last_sent().is_none());
    }

    #[test]
    fn test_check_period() {
        assert_eq!(HeartbeatConfig::default().check_period(), Duration::from_millis(250));
        let fast = HeartbeatConfig::new().with_interval(Duration::from_millis(8));
        assert_eq!(fast.check_period(), Duration::from_millis(10));
    }
}
