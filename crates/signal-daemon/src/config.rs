//! Configuration types for signal-daemon.

use std::time::Duration;

/// Default base URL of a locally running signal-cli daemon.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

/// Configuration for connecting to the signal-cli daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Base URL of the daemon HTTP server, without a trailing slash.
    pub base_url: String,
    /// Account phone number for multi-account mode.
    /// If None, assumes single-account mode.
    pub account: Option<String>,
    /// Timeout applied to RPC and health requests. Event streams are exempt.
    pub request_timeout: Duration,
}

impl DaemonConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            account: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Create configuration with a specific account for multi-account mode.
    pub fn with_account(base_url: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            ..Self::new(base_url)
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Get the RPC endpoint URL.
    pub fn rpc_url(&self) -> String {
        format!("{}/api/v1/rpc", self.base_url)
    }

    /// Get the events endpoint URL (with account query param if set).
    pub fn events_url(&self) -> String {
        match &self.account {
            Some(account) => {
                let encoded = urlencoding::encode(account);
                format!("{}/api/v1/events?account={}", self.base_url, encoded)
            }
            None => format!("{}/api/v1/events", self.base_url),
        }
    }

    /// Get the health check endpoint URL.
    pub fn check_url(&self) -> String {
        format!("{}/api/v1/check", self.base_url)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
