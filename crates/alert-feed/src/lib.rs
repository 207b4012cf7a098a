//! Client for the regional air-raid alert provider.
//!
//! The provider exposes two access modes and this crate wraps both:
//!
//! - Pull: one-shot HTTP requests for every region or a single region
//! - Push: a long-lived Server-Sent Events stream of `update` events
//!
//! The client holds no state of its own. Consumers should depend on the
//! [`AlertFeed`] trait so watch logic can run against a scripted feed in tests.
//!
//! # Example
//!
//! ```no_run
//! use alert_feed::{AlertApiClient, AlertFeed, FeedConfig};
//!
//! # async fn example() -> Result<(), alert_feed::FeedError> {
//! let config = FeedConfig::new("https://alerts.com.ua/api", "secret-key");
//! let client = AlertApiClient::new(config)?;
//!
//! let snapshot = client.fetch_all().await?;
//! for state in snapshot.iter() {
//!     println!("{}: {}", state.name, state.alert);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod stream;
pub mod types;

use async_trait::async_trait;

pub use client::AlertApiClient;
pub use config::FeedConfig;
pub use error::FeedError;
pub use stream::{AlertStream, EventStream, StreamEvent, StreamScope};
pub use types::{RegionId, RegionState, Snapshot};

/// Access to the remote alert provider.
///
/// Implemented by [`AlertApiClient`] for the real provider. The trait is
/// object-safe and is normally held as `Arc<dyn AlertFeed>`.
#[async_trait]
pub trait AlertFeed: Send + Sync {
    /// Fetch the current state of every region.
    async fn fetch_all(&self) -> Result<Snapshot, FeedError>;

    /// Fetch the current state of one region.
    ///
    /// Fails with [`FeedError::NotFound`] when the provider does not know the id.
    async fn fetch_one(&self, region_id: RegionId) -> Result<RegionState, FeedError>;

    /// Open a push stream for the given scope.
    ///
    /// The connection is established lazily when the stream is first polled.
    /// A stream that yields an error is dead and ends; open a new one to
    /// keep watching.
    fn open_stream(&self, scope: StreamScope) -> Result<AlertStream, FeedError>;
}
