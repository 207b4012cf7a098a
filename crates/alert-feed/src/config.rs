//! Configuration types for alert-feed.

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;

use crate::types::RegionId;

/// Header carrying the provider API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Configuration for connecting to the alert provider.
#[derive(Clone)]
pub struct FeedConfig {
    /// Base URL of the provider API (e.g., "https://alerts.com.ua/api").
    pub base_url: String,
    /// Provider API key. Never logged.
    pub api_key: SecretString,
    /// Timeout for pull requests. Push streams have no timeout.
    pub request_timeout: Duration,
}

impl FeedConfig {
    /// Create a new configuration with the given base URL and API key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key.into()),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Override the pull request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// URL for the all-regions snapshot.
    pub fn states_url(&self) -> String {
        format!("{}/states", self.base_url)
    }

    /// URL for a single region.
    pub fn state_url(&self, region_id: RegionId) -> String {
        format!("{}/states/{}", self.base_url, region_id)
    }

    /// URL for the all-regions live stream.
    pub fn live_url(&self) -> String {
        format!("{}/states/live", self.base_url)
    }

    /// URL for a single region's live stream.
    pub fn region_live_url(&self, region_id: RegionId) -> String {
        format!("{}/states/live/{}", self.base_url, region_id)
    }
}

impl fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
