//! Subscriber to active watch mapping.

use std::collections::HashMap;
use std::fmt;

use alert_feed::RegionId;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use crate::handle::{HandleKind, StreamHandle, WatchHandle};
use crate::notifier::Notification;

/// Sending side of a push watch's delivery queue.
pub type Outbox = mpsc::UnboundedSender<Notification>;

/// Identity of a subscriber: a direct chat or a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriberId {
    /// Phone number or group id.
    pub recipient: String,
    pub is_group: bool,
}

impl SubscriberId {
    pub fn direct(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            is_group: false,
        }
    }

    pub fn group(group_id: impl Into<String>) -> Self {
        Self {
            recipient: group_id.into(),
            is_group: true,
        }
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_group {
            write!(f, "group:{}", self.recipient)
        } else {
            f.write_str(&self.recipient)
        }
    }
}

/// What a subscription watches and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "mode", content = "region", rename_all = "snake_case")]
pub enum WatchMode {
    SingleRegionPoll(RegionId),
    AllRegionsPoll,
    SingleRegionPush(RegionId),
    AllRegionsPush,
    /// Diagnostic counter, unrelated to alerts.
    Heartbeat,
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchMode::SingleRegionPoll(id) => write!(f, "single-region-poll({})", id),
            WatchMode::AllRegionsPoll => f.write_str("all-regions-poll"),
            WatchMode::SingleRegionPush(id) => write!(f, "single-region-push({})", id),
            WatchMode::AllRegionsPush => f.write_str("all-regions-push"),
            WatchMode::Heartbeat => f.write_str("heartbeat"),
        }
    }
}

/// A subscriber's active watch.
#[derive(Debug)]
pub struct Subscription {
    pub subscriber_id: SubscriberId,
    pub mode: WatchMode,
    /// Unique per started watch; distinguishes a restarted watch from its predecessor.
    pub watch_id: u64,
    pub handle: WatchHandle,
    /// Notifications for this subscriber, sent by the watch's own task.
    /// Closed once the watch is stopped.
    pub outbox: Option<Outbox>,
}

/// Read-only view of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatus {
    pub subscriber_id: SubscriberId,
    pub mode: WatchMode,
    pub watch_id: u64,
    pub kind: HandleKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<u64>,
}

impl From<&Subscription> for SubscriptionStatus {
    fn from(sub: &Subscription) -> Self {
        Self {
            subscriber_id: sub.subscriber_id.clone(),
            mode: sub.mode,
            watch_id: sub.watch_id,
            kind: sub.handle.kind(),
            connection: sub.handle.connection(),
        }
    }
}

/// Map from subscriber to its single active subscription.
///
/// A pure map: it never closes handles itself. Callers close the handle of a
/// removed subscription, and must stop a subscriber before starting it again.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: Mutex<HashMap<SubscriberId, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of a subscriber's subscription, if any.
    pub async fn get(&self, subscriber_id: &SubscriberId) -> Option<SubscriptionStatus> {
        self.subscriptions
            .lock()
            .await
            .get(subscriber_id)
            .map(SubscriptionStatus::from)
    }

    /// Record a new subscription.
    ///
    /// Returns any subscription that was still registered for the subscriber;
    /// its handle is still live and the caller must close it.
    pub async fn start(&self, subscription: Subscription) -> Option<Subscription> {
        self.subscriptions
            .lock()
            .await
            .insert(subscription.subscriber_id.clone(), subscription)
    }

    /// Remove a subscriber's subscription. No-op when absent.
    pub async fn stop(&self, subscriber_id: &SubscriberId) -> Option<Subscription> {
        self.subscriptions.lock().await.remove(subscriber_id)
    }

    /// Point a push subscription at a new live connection.
    ///
    /// Succeeds only if `watch_id` is still the subscriber's registered push
    /// watch, returning the previous stream handle. Otherwise the new handle
    /// is handed back.
    pub async fn replace_stream(
        &self,
        subscriber_id: &SubscriberId,
        watch_id: u64,
        stream: StreamHandle,
    ) -> Result<StreamHandle, StreamHandle> {
        let mut subscriptions = self.subscriptions.lock().await;

        let current = match subscriptions.remove(subscriber_id) {
            Some(sub) if sub.watch_id == watch_id => sub,
            Some(other) => {
                subscriptions.insert(subscriber_id.clone(), other);
                return Err(stream);
            }
            None => return Err(stream),
        };

        let Subscription {
            subscriber_id,
            mode,
            watch_id,
            handle,
            outbox,
        } = current;

        match handle {
            WatchHandle::Push {
                task,
                stream: previous,
            } => {
                subscriptions.insert(
                    subscriber_id.clone(),
                    Subscription {
                        subscriber_id,
                        mode,
                        watch_id,
                        handle: WatchHandle::Push { task, stream },
                        outbox,
                    },
                );
                Ok(previous)
            }
            handle @ WatchHandle::Poll(_) => {
                subscriptions.insert(
                    subscriber_id.clone(),
                    Subscription {
                        subscriber_id,
                        mode,
                        watch_id,
                        handle,
                        outbox,
                    },
                );
                Err(stream)
            }
        }
    }

    /// Outboxes of the subscribers currently watching in the given mode,
    /// sorted by subscriber.
    pub async fn outboxes_with_mode(&self, mode: WatchMode) -> Vec<(SubscriberId, Outbox)> {
        let mut outboxes: Vec<_> = self
            .subscriptions
            .lock()
            .await
            .values()
            .filter(|sub| sub.mode == mode)
            .filter_map(|sub| Some((sub.subscriber_id.clone(), sub.outbox.clone()?)))
            .collect();
        outboxes.sort_by(|a, b| a.0.cmp(&b.0));
        outboxes
    }

    /// Status of every subscription, sorted by subscriber.
    pub async fn list(&self) -> Vec<SubscriptionStatus> {
        let mut all: Vec<_> = self
            .subscriptions
            .lock()
            .await
            .values()
            .map(SubscriptionStatus::from)
            .collect();
        all.sort_by(|a, b| a.subscriber_id.cmp(&b.subscriber_id));
        all
    }

    /// Remove every subscription.
    pub async fn drain(&self) -> Vec<Subscription> {
        self.subscriptions
            .lock()
            .await
            .drain()
            .map(|(_, sub)| sub)
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.subscriptions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscriptions.lock().await.is_empty()
    }
}
