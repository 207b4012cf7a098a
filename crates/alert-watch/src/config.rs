//! Configuration for the subscription controller.

use std::time::Duration;

/// Sticker identifiers (`packId:stickerId`) for single-region notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stickers {
    pub raised: String,
    pub cleared: String,
}

impl Stickers {
    /// Sticker for a transition to the given alert polarity.
    pub fn for_alert(&self, alert: bool) -> &str {
        if alert {
            &self.raised
        } else {
            &self.cleared
        }
    }
}

/// Backoff applied when a live stream keeps failing.
///
/// The first reconnect after a drop is immediate; only consecutive failures
/// without an intervening open are delayed.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the second consecutive attempt.
    pub initial_delay: Duration,
    /// Upper bound on any delay.
    pub max_delay: Duration,
    /// Multiplier per further attempt.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reading from the stream opened after `attempt` consecutive failures.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }
}

/// Settings for the subscription controller.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Period of poll watches.
    pub poll_interval: Duration,
    /// Period of the diagnostic heartbeat.
    pub heartbeat_interval: Duration,
    /// Live stream reconnect backoff.
    pub reconnect: ReconnectPolicy,
    /// Stickers for single-region notifications. Without them single-region
    /// watches send the alert text instead.
    pub stickers: Option<Stickers>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(60),
            reconnect: ReconnectPolicy::default(),
            stickers: None,
        }
    }
}

impl WatchConfig {
    /// Override the poll period.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Send stickers for single-region flips.
    pub fn with_stickers(mut self, stickers: Stickers) -> Self {
        self.stickers = Some(stickers);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reconnect_is_immediate() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(20), Duration::from_secs(30));
    }

    #[test]
    fn test_sticker_selection() {
        let stickers = Stickers {
            raised: "pack:1".to_string(),
            cleared: "pack:2".to_string(),
        };
        assert_eq!(stickers.for_alert(true), "pack:1");
        assert_eq!(stickers.for_alert(false), "pack:2");
    }

    #[test]
    fn test_defaults() {
        let config = WatchConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(60));
        assert!(config.stickers.is_none());
    }
}
