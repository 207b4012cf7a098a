//! Outbound notification seam.

use std::sync::{Arc, Mutex, PoisonError};

use alert_feed::RegionState;
use async_trait::async_trait;

use crate::error::WatchError;
use crate::registry::SubscriberId;

/// Text appended to a region name when an alert is raised.
pub const ALERT_RAISED_TEXT: &str = "ПОВІТРЯНА ТРИВОГА! \n 🚨🚨🚨";

/// Text appended to a region name when an alert is cleared.
pub const ALERT_CLEARED_TEXT: &str = "ВІДБІЙ ПОВІТРЯНОЇ ТРИВОГИ! \n ✅✅✅";

/// A message for a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Text(String),
    Sticker(String),
}

impl Notification {
    /// Alert text naming the region, e.g. `м. Київ: ПОВІТРЯНА ТРИВОГА! ...`.
    pub fn region_alert(region: &RegionState) -> Self {
        let text = if region.alert {
            ALERT_RAISED_TEXT
        } else {
            ALERT_CLEARED_TEXT
        };
        Notification::Text(format!("{}: {}", region.name, text))
    }
}

/// Transport used to deliver notifications.
///
/// Abstracted so watches can run against Signal, logs, or a test recorder.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a plain-text message.
    async fn send_text(&self, to: &SubscriberId, text: &str) -> Result<(), WatchError>;

    /// Send a sticker by identifier.
    async fn send_sticker(&self, to: &SubscriberId, sticker_id: &str) -> Result<(), WatchError>;

    /// Send a notification of either kind.
    async fn notify(&self, to: &SubscriberId, notification: &Notification) -> Result<(), WatchError> {
        match notification {
            Notification::Text(text) => self.send_text(to, text).await,
            Notification::Sticker(id) => self.send_sticker(to, id).await,
        }
    }
}

/// A notifier that logs every notification and sends nothing.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send_text(&self, to: &SubscriberId, text: &str) -> Result<(), WatchError> {
        tracing::info!(subscriber = %to, "Text notification: {}", text);
        Ok(())
    }

    async fn send_sticker(&self, to: &SubscriberId, sticker_id: &str) -> Result<(), WatchError> {
        tracing::info!(subscriber = %to, sticker = %sticker_id, "Sticker notification");
        Ok(())
    }
}

/// A notifier that records notifications in memory.
///
/// Clones share the same record. Useful in tests and for dry runs.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(SubscriberId, Notification)>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder whose sends all fail (after being recorded).
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every notification so far, in send order.
    pub fn sent(&self) -> Vec<(SubscriberId, Notification)> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Notifications sent to one subscriber, in send order.
    pub fn sent_to(&self, to: &SubscriberId) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|(who, _)| who == to)
            .map(|(_, n)| n)
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn record(&self, to: &SubscriberId, notification: Notification) -> Result<(), WatchError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((to.clone(), notification));
        if self.fail {
            return Err(WatchError::Notify("recorder configured to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, to: &SubscriberId, text: &str) -> Result<(), WatchError> {
        self.record(to, Notification::Text(text.to_string()))
    }

    async fn send_sticker(&self, to: &SubscriberId, sticker_id: &str) -> Result<(), WatchError> {
        self.record(to, Notification::Sticker(sticker_id.to_string()))
    }
}
