//! Error types for watch operations.

use alert_feed::FeedError;
use thiserror::Error;

/// Errors that can occur while managing watches.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The alert provider could not be reached or returned garbage.
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// The messaging transport refused a notification.
    #[error("notify failed: {0}")]
    Notify(String),

    /// The snapshot could not be rendered.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
