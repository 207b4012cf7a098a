//! Alert watches for the air-raid bot.
//!
//! This crate owns the subscription lifecycle and the state-diff engine:
//!
//! - [`StateCache`] - last known snapshot of every region, shared process-wide
//! - [`compute_edges`] - alert flips between two snapshots
//! - [`SubscriptionRegistry`] - at most one active watch per subscriber
//! - [`SubscriptionController`] - starts/stops poll, push and heartbeat watches
//!   and sends notifications through a [`Notifier`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use alert_feed::{AlertApiClient, FeedConfig};
//! use alert_watch::{LoggingNotifier, StateCache, SubscriberId, SubscriptionController, WatchConfig};
//!
//! # async fn example() -> Result<(), alert_watch::WatchError> {
//! let feed = AlertApiClient::new(FeedConfig::new("https://alerts.com.ua/api", "key"))?;
//! let controller = SubscriptionController::new(
//!     Arc::new(feed),
//!     Arc::new(LoggingNotifier),
//!     StateCache::new(),
//!     WatchConfig::default(),
//! );
//!
//! let subscriber = SubscriberId::direct("+15551234567");
//! controller.start_all_regions_poll(subscriber.clone()).await?;
//! // ...
//! controller.stop(&subscriber).await;
//! # Ok(())
//! # }
//! ```

mod cache;
mod command;
mod config;
mod controller;
mod diff;
mod error;
mod handle;
mod notifier;
mod registry;

pub use cache::{Observation, StateCache};
pub use command::{Command, BOT_NAME, DEFAULT_REGION_ID};
pub use config::{ReconnectPolicy, Stickers, WatchConfig};
pub use controller::SubscriptionController;
pub use diff::{compute_edges, AlertEdge};
pub use error::WatchError;
pub use handle::{HandleKind, StreamHandle, WatchHandle, WatchTask};
pub use notifier::{
    LoggingNotifier, Notification, Notifier, RecordingNotifier, ALERT_CLEARED_TEXT, ALERT_RAISED_TEXT,
};
pub use registry::{Outbox, SubscriberId, Subscription, SubscriptionRegistry, SubscriptionStatus, WatchMode};

// Re-export feed types used in this crate's API
pub use alert_feed::{AlertFeed, AlertStream, FeedError, RegionId, RegionState, Snapshot, StreamEvent, StreamScope};
