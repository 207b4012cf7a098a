//! Subscription lifecycle and the watch loops behind it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alert_feed::{AlertFeed, AlertStream, FeedError, RegionId, RegionState, StreamEvent, StreamScope};
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::{Observation, StateCache};
use crate::command::Command;
use crate::config::WatchConfig;
use crate::diff::{compute_edges, AlertEdge};
use crate::error::WatchError;
use crate::handle::{StreamHandle, WatchHandle, WatchTask};
use crate::notifier::{Notification, Notifier};
use crate::registry::{SubscriberId, Subscription, SubscriptionRegistry, SubscriptionStatus, WatchMode};

/// Starts and stops per-subscriber watches and turns alert edges into
/// notifications.
///
/// Each subscriber has at most one live watch. Starting a watch first tears
/// down the existing one; [`stop`](Self::stop) returns only after the watch
/// task is gone, so nothing attributable to it is delivered afterwards.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct SubscriptionController {
    inner: Arc<Shared>,
}

struct Shared {
    feed: Arc<dyn AlertFeed>,
    notifier: Arc<dyn Notifier>,
    cache: StateCache,
    registry: SubscriptionRegistry,
    config: WatchConfig,
    /// Serializes start/stop so a subscriber never ends up with two handles.
    commands: Mutex<()>,
    next_id: AtomicU64,
}

/// Identity of one push watch, carried by its supervisor task.
#[derive(Debug, Clone)]
struct PushWatch {
    subscriber: SubscriberId,
    watch_id: u64,
    mode: WatchMode,
    scope: StreamScope,
}

/// Receiving side of a push watch's outbox.
type Inbox = mpsc::UnboundedReceiver<Notification>;

/// Per-supervisor bookkeeping across reconnects.
#[derive(Debug, Default)]
struct PushProgress {
    acknowledged: bool,
    /// Consecutive failures since the last successful open.
    attempt: u32,
}

impl SubscriptionController {
    /// Create a controller over a shared cache.
    pub fn new(
        feed: Arc<dyn AlertFeed>,
        notifier: Arc<dyn Notifier>,
        cache: StateCache,
        config: WatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                feed,
                notifier,
                cache,
                registry: SubscriptionRegistry::new(),
                config,
                commands: Mutex::new(()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// The shared state cache.
    pub fn cache(&self) -> &StateCache {
        &self.inner.cache
    }

    /// The subscription registry.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.registry
    }

    /// The notifier used for all outbound messages.
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.inner.notifier
    }

    pub fn config(&self) -> &WatchConfig {
        &self.inner.config
    }

    /// Fetch every region once and install the result in the cache.
    ///
    /// Returns the number of regions installed.
    pub async fn refresh(&self) -> Result<usize, WatchError> {
        let snapshot = self.inner.feed.fetch_all().await?;
        let count = snapshot.len();
        self.inner.cache.replace(snapshot).await;
        info!(regions = count, "State cache refreshed");
        Ok(count)
    }

    /// Poll one region every period and notify when its alert flips.
    pub async fn start_single_region_poll(
        &self,
        subscriber: SubscriberId,
        region: RegionId,
    ) -> Result<(), WatchError> {
        self.start(subscriber, WatchMode::SingleRegionPoll(region)).await
    }

    /// Poll every region every period and send a text per flipped region.
    pub async fn start_all_regions_poll(&self, subscriber: SubscriberId) -> Result<(), WatchError> {
        self.start(subscriber, WatchMode::AllRegionsPoll).await
    }

    /// Follow one region's live stream.
    pub async fn start_single_region_push(
        &self,
        subscriber: SubscriberId,
        region: RegionId,
    ) -> Result<(), WatchError> {
        self.start(subscriber, WatchMode::SingleRegionPush(region)).await
    }

    /// Follow the all-regions live stream.
    pub async fn start_all_regions_push(&self, subscriber: SubscriberId) -> Result<(), WatchError> {
        self.start(subscriber, WatchMode::AllRegionsPush).await
    }

    /// Send a counting heartbeat every heartbeat period.
    pub async fn start_heartbeat(&self, subscriber: SubscriberId) -> Result<(), WatchError> {
        self.start(subscriber, WatchMode::Heartbeat).await
    }

    /// Replace the subscriber's watch with a new one in `mode`.
    ///
    /// On error the subscriber is left without a watch.
    pub async fn start(&self, subscriber: SubscriberId, mode: WatchMode) -> Result<(), WatchError> {
        let _guard = self.inner.commands.lock().await;
        self.teardown(&subscriber).await;

        let watch_id = self.inner.next_id();
        let cancel = CancellationToken::new();
        let shared = Arc::clone(&self.inner);

        let (handle, outbox, armed) = match mode {
            WatchMode::SingleRegionPoll(region) => {
                let join = tokio::spawn(shared.run_region_poll(
                    subscriber.clone(),
                    region,
                    cancel.clone(),
                ));
                (WatchHandle::Poll(WatchTask::new(cancel, join)), None, None)
            }
            WatchMode::AllRegionsPoll => {
                let join = tokio::spawn(shared.run_all_regions_poll(subscriber.clone(), cancel.clone()));
                (WatchHandle::Poll(WatchTask::new(cancel, join)), None, None)
            }
            WatchMode::Heartbeat => {
                let join = tokio::spawn(shared.run_heartbeat(subscriber.clone(), cancel.clone()));
                (WatchHandle::Poll(WatchTask::new(cancel, join)), None, None)
            }
            WatchMode::SingleRegionPush(_) | WatchMode::AllRegionsPush => {
                let scope = match mode {
                    WatchMode::SingleRegionPush(region) => StreamScope::Region(region),
                    _ => StreamScope::AllRegions,
                };
                let stream = self.inner.feed.open_stream(scope)?;
                let stream_handle = StreamHandle::new(self.inner.next_id(), cancel.child_token());
                let watch = PushWatch {
                    subscriber: subscriber.clone(),
                    watch_id,
                    mode,
                    scope,
                };

                // The supervisor waits until it is registered, so a reconnect
                // can always find its own entry.
                let (armed_tx, armed_rx) = oneshot::channel();
                let (outbox, inbox) = mpsc::unbounded_channel();
                let join = tokio::spawn(shared.run_push(
                    watch,
                    stream,
                    stream_handle.clone(),
                    cancel.clone(),
                    armed_rx,
                    inbox,
                ));
                let handle = WatchHandle::Push {
                    task: WatchTask::new(cancel, join),
                    stream: stream_handle,
                };
                (handle, Some(outbox), Some(armed_tx))
            }
        };

        let subscription = Subscription {
            subscriber_id: subscriber.clone(),
            mode,
            watch_id,
            handle,
            outbox,
        };
        if let Some(stale) = self.inner.registry.start(subscription).await {
            error!(
                subscriber = %subscriber,
                watch_id = stale.watch_id,
                "Registry still held a watch after teardown, closing it"
            );
            stale.handle.close().await;
        }
        if let Some(armed) = armed {
            let _ = armed.send(());
        }

        info!(subscriber = %subscriber, mode = %mode, watch_id, "Watch started");
        Ok(())
    }

    /// Stop the subscriber's watch.
    ///
    /// Idempotent; returns whether a watch was running. Any per-watch counters
    /// die with the watch.
    pub async fn stop(&self, subscriber: &SubscriberId) -> bool {
        let _guard = self.inner.commands.lock().await;
        let stopped = self.teardown(subscriber).await;
        if stopped {
            info!(subscriber = %subscriber, "Watch stopped");
        } else {
            debug!(subscriber = %subscriber, "Stop requested with no active watch");
        }
        stopped
    }

    /// Render the current snapshot as pretty-printed JSON.
    pub async fn dump(&self) -> Result<String, WatchError> {
        let snapshot = self.inner.cache.current().await;
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Status of every active subscription.
    pub async fn subscriptions(&self) -> Vec<SubscriptionStatus> {
        self.inner.registry.list().await
    }

    /// Run a parsed command for a subscriber.
    ///
    /// Returns the reply text for commands that answer directly (`Dump`).
    /// `Greeting` needs the sender's profile and is left to the caller.
    pub async fn execute(
        &self,
        subscriber: &SubscriberId,
        command: Command,
    ) -> Result<Option<String>, WatchError> {
        match command {
            Command::StartSingleRegionPoll(region) => {
                self.start_single_region_poll(subscriber.clone(), region).await?
            }
            Command::StartAllRegionsPoll => self.start_all_regions_poll(subscriber.clone()).await?,
            Command::StartSingleRegionPush(region) => {
                self.start_single_region_push(subscriber.clone(), region).await?
            }
            Command::StartAllRegionsPush => self.start_all_regions_push(subscriber.clone()).await?,
            Command::Heartbeat => self.start_heartbeat(subscriber.clone()).await?,
            Command::Stop => {
                self.stop(subscriber).await;
            }
            Command::Dump => return self.dump().await.map(Some),
            Command::Greeting => {}
        }
        Ok(None)
    }

    /// Stop every watch. Used on process shutdown.
    pub async fn shutdown(&self) {
        let _guard = self.inner.commands.lock().await;
        let subscriptions = self.inner.registry.drain().await;
        let count = subscriptions.len();
        for sub in subscriptions {
            sub.handle.close().await;
        }
        info!(watches = count, "All watches stopped");
    }

    async fn teardown(&self, subscriber: &SubscriberId) -> bool {
        match self.inner.registry.stop(subscriber).await {
            Some(sub) => {
                debug!(subscriber = %subscriber, mode = %sub.mode, watch_id = sub.watch_id, "Tearing down watch");
                sub.handle.close().await;
                true
            }
            None => false,
        }
    }
}

impl Shared {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Deliver a notification; transport failures are logged and swallowed.
    async fn deliver(&self, to: &SubscriberId, notification: Notification) {
        if let Err(e) = self.notifier.notify(to, &notification).await {
            warn!(subscriber = %to, "Failed to deliver notification: {}", e);
        }
    }

    /// Sticker for a single-region flip, or the alert text when no stickers
    /// are configured.
    fn region_notification(&self, edge: &AlertEdge) -> Notification {
        match &self.config.stickers {
            Some(stickers) => Notification::Sticker(stickers.for_alert(edge.current_alert).to_string()),
            None => Notification::region_alert(&edge.region),
        }
    }

    async fn run_region_poll(
        self: Arc<Self>,
        subscriber: SubscriberId,
        region: RegionId,
        cancel: CancellationToken,
    ) {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let fetched = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.feed.fetch_one(region) => result,
            };

            let state = match fetched {
                Ok(state) => state,
                Err(e) => {
                    warn!(subscriber = %subscriber, region, "Poll tick failed: {}", e);
                    continue;
                }
            };

            match self.cache.observe(state).await {
                Observation::Seeded => debug!(region, "First observation, cache seeded"),
                Observation::Unchanged => {}
                Observation::Edge(edge) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    info!(
                        subscriber = %subscriber,
                        region,
                        alert = edge.current_alert,
                        "Region alert changed"
                    );
                    self.deliver(&subscriber, self.region_notification(&edge)).await;
                }
            }
        }

        debug!(subscriber = %subscriber, region, "Region poll finished");
    }

    async fn run_all_regions_poll(self: Arc<Self>, subscriber: SubscriberId, cancel: CancellationToken) {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let fetched = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.feed.fetch_all() => result,
            };

            let snapshot = match fetched {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(subscriber = %subscriber, "Poll tick failed: {}", e);
                    continue;
                }
            };

            let previous = self.cache.replace(snapshot.clone()).await;
            if previous.is_empty() {
                debug!(regions = snapshot.len(), "Cache was empty, snapshot installed");
                continue;
            }

            for edge in compute_edges(&previous, &snapshot) {
                if cancel.is_cancelled() {
                    return;
                }
                info!(
                    subscriber = %subscriber,
                    region = edge.region.id,
                    alert = edge.current_alert,
                    "Region alert changed"
                );
                self.deliver(&subscriber, Notification::region_alert(&edge.region))
                    .await;
            }
        }

        debug!(subscriber = %subscriber, "All-regions poll finished");
    }

    async fn run_heartbeat(self: Arc<Self>, subscriber: SubscriberId, cancel: CancellationToken) {
        let mut ticker = interval(self.config.heartbeat_interval);
        let mut counter: u64 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            counter += 1;
            self.deliver(
                &subscriber,
                Notification::Text(format!("Calls *{}* times.", counter)),
            )
            .await;
        }
    }

    async fn run_push(
        self: Arc<Self>,
        watch: PushWatch,
        mut stream: AlertStream,
        mut handle: StreamHandle,
        cancel: CancellationToken,
        armed: oneshot::Receiver<()>,
        mut inbox: Inbox,
    ) {
        if armed.await.is_err() {
            return;
        }

        let mut progress = PushProgress::default();

        loop {
            let failure = self
                .follow_stream(&watch, &mut stream, &handle, &cancel, &mut progress, &mut inbox)
                .await;
            if cancel.is_cancelled() {
                break;
            }

            match failure {
                Some(e) => warn!(
                    subscriber = %watch.subscriber,
                    connection = handle.connection(),
                    "Live stream dropped: {}", e
                ),
                None => warn!(
                    subscriber = %watch.subscriber,
                    connection = handle.connection(),
                    "Live stream ended"
                ),
            }
            handle.close();

            match self.reconnect(&watch, &cancel, &mut progress, &mut inbox).await {
                Some((next_stream, next_handle)) => {
                    stream = next_stream;
                    handle = next_handle;
                }
                None => break,
            }
        }

        debug!(subscriber = %watch.subscriber, watch_id = watch.watch_id, "Push watch finished");
    }

    /// Process events until the stream fails, ends or is closed.
    async fn follow_stream(
        &self,
        watch: &PushWatch,
        stream: &mut AlertStream,
        handle: &StreamHandle,
        cancel: &CancellationToken,
        progress: &mut PushProgress,
        inbox: &mut Inbox,
    ) -> Option<FeedError> {
        loop {
            let next = tokio::select! {
                _ = handle.closed() => return None,
                Some(notification) = inbox.recv() => {
                    self.deliver(&watch.subscriber, notification).await;
                    continue;
                }
                item = stream.next() => item,
            };

            match next {
                Some(Ok(StreamEvent::Opened)) => {
                    progress.attempt = 0;
                    if progress.acknowledged {
                        info!(subscriber = %watch.subscriber, connection = handle.connection(), "Live stream reconnected");
                    } else {
                        progress.acknowledged = true;
                        self.deliver(&watch.subscriber, Notification::Text(ack_text(watch.scope)))
                            .await;
                    }
                }
                Some(Ok(StreamEvent::Update(state))) => {
                    self.apply_push_update(watch, state, cancel).await;
                }
                Some(Err(e)) => return Some(e),
                None => return None,
            }
        }
    }

    /// Open a replacement stream and point the registry at it.
    ///
    /// The registry is updated before any backoff delay, so a `Stop` issued
    /// meanwhile closes the new connection.
    async fn reconnect(
        &self,
        watch: &PushWatch,
        cancel: &CancellationToken,
        progress: &mut PushProgress,
        inbox: &mut Inbox,
    ) -> Option<(AlertStream, StreamHandle)> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }

            let delay = self.config.reconnect.delay_for_attempt(progress.attempt);
            progress.attempt = progress.attempt.saturating_add(1);

            let stream = match self.feed.open_stream(watch.scope) {
                Ok(stream) => stream,
                Err(e) => {
                    error!(subscriber = %watch.subscriber, "Failed to reopen live stream: {}", e);
                    let backoff = self.config.reconnect.delay_for_attempt(progress.attempt);
                    if !self.pause(watch, backoff, cancel, inbox).await {
                        return None;
                    }
                    continue;
                }
            };

            let handle = StreamHandle::new(self.next_id(), cancel.child_token());
            match self
                .registry
                .replace_stream(&watch.subscriber, watch.watch_id, handle.clone())
                .await
            {
                Ok(previous) => {
                    previous.close();
                    info!(
                        subscriber = %watch.subscriber,
                        previous = previous.connection(),
                        connection = handle.connection(),
                        "Live stream replaced"
                    );
                }
                Err(rejected) => {
                    rejected.close();
                    debug!(subscriber = %watch.subscriber, "Watch no longer registered, abandoning reconnect");
                    return None;
                }
            }

            if !delay.is_zero() && !self.pause(watch, delay, cancel, inbox).await {
                return None;
            }
            return Some((stream, handle));
        }
    }

    /// Wait out a backoff delay while still draining the outbox.
    ///
    /// Returns false if the watch was cancelled first.
    async fn pause(
        &self,
        watch: &PushWatch,
        delay: Duration,
        cancel: &CancellationToken,
        inbox: &mut Inbox,
    ) -> bool {
        let timer = sleep(delay);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = &mut timer => return true,
                Some(notification) = inbox.recv() => {
                    self.deliver(&watch.subscriber, notification).await;
                }
            }
        }
    }

    async fn apply_push_update(&self, watch: &PushWatch, state: RegionState, cancel: &CancellationToken) {
        let region = state.id;
        let edge = match self.cache.observe(state).await {
            Observation::Seeded => {
                debug!(region, "First observation, cache seeded");
                return;
            }
            Observation::Unchanged => return,
            Observation::Edge(edge) => edge,
        };

        if cancel.is_cancelled() {
            return;
        }
        info!(
            subscriber = %watch.subscriber,
            region,
            alert = edge.current_alert,
            "Region alert changed"
        );

        match watch.mode {
            WatchMode::AllRegionsPush => {
                // Each recipient's own task delivers, so a recipient stopped
                // meanwhile gets nothing.
                let notification = Notification::region_alert(&edge.region);
                for (subscriber, outbox) in self
                    .registry
                    .outboxes_with_mode(WatchMode::AllRegionsPush)
                    .await
                {
                    if outbox.send(notification.clone()).is_err() {
                        debug!(subscriber = %subscriber, region, "Recipient watch gone, notification dropped");
                    }
                }
            }
            _ => {
                self.deliver(&watch.subscriber, self.region_notification(&edge))
                    .await;
            }
        }
    }
}

fn ack_text(scope: StreamScope) -> String {
    match scope {
        StreamScope::Region(id) => format!("Connected to live alerts for region {}.", id),
        StreamScope::AllRegions => "Connected to live alerts for all regions.".to_string(),
    }
}
