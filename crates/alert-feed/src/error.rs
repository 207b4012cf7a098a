//! Error types for alert-feed.

use thiserror::Error;

use crate::types::RegionId;

/// Errors that can occur when talking to the alert provider.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network failure talking to the provider.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Snapshot or event payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The provider does not know this region.
    #[error("region {0} not found")]
    NotFound(RegionId),

    /// Push connection dropped or could not be opened.
    #[error("stream error: {0}")]
    Stream(String),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FeedError {
    /// Whether this error came from the network or HTTP layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, FeedError::Transport(_) | FeedError::Status { .. })
    }
}
