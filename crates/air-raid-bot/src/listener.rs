//! Turns inbound Signal messages into controller commands.

use alert_watch::{Command, RegionId, SubscriberId, SubscriptionController};
use futures::StreamExt;
use signal_daemon::{DaemonError, Envelope, SignalClient};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::notifier::subscriber_for;

/// A command addressed to the bot, with the context needed to answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub subscriber: SubscriberId,
    pub command: Command,
    pub sender_name: String,
}

/// Reads inbound messages and dispatches commands.
pub struct CommandListener {
    controller: SubscriptionController,
    default_region: RegionId,
    bot_account: String,
}

impl CommandListener {
    pub fn new(
        controller: SubscriptionController,
        default_region: RegionId,
        bot_account: impl Into<String>,
    ) -> Self {
        Self {
            controller,
            default_region,
            bot_account: bot_account.into(),
        }
    }

    /// Extract a command from an envelope, skipping our own messages and
    /// anything that is not a recognized command.
    pub fn interpret(&self, envelope: &Envelope) -> Option<Inbound> {
        let from_self = envelope.source == self.bot_account
            || envelope.source_number.as_deref() == Some(self.bot_account.as_str());
        if from_self {
            return None;
        }

        let command = Command::parse(envelope.text()?, self.default_region)?;
        let reply_to = envelope.reply_to()?;
        Some(Inbound {
            subscriber: subscriber_for(&reply_to),
            command,
            sender_name: envelope.sender_name().to_string(),
        })
    }

    /// Handle one envelope. Failures are logged, never propagated.
    pub async fn handle(&self, envelope: &Envelope) {
        let Some(inbound) = self.interpret(envelope) else {
            debug!("Ignoring message without a command");
            return;
        };
        info!(
            subscriber = %inbound.subscriber,
            command = ?inbound.command,
            "Command received"
        );

        let reply = match inbound.command {
            Command::Greeting => Some(format!("Hello, {}", inbound.sender_name)),
            command => match self.controller.execute(&inbound.subscriber, command).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!(subscriber = %inbound.subscriber, "Command failed: {}", e);
                    None
                }
            },
        };

        if let Some(text) = reply {
            if let Err(e) = self
                .controller
                .notifier()
                .send_text(&inbound.subscriber, &text)
                .await
            {
                warn!(subscriber = %inbound.subscriber, "Failed to send reply: {}", e);
            }
        }
    }

    /// Follow the daemon's message stream until `shutdown` fires.
    pub async fn run(self, client: SignalClient, shutdown: CancellationToken) -> Result<(), DaemonError> {
        let mut stream = signal_daemon::subscribe(&client)?;
        info!("Listening for commands");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping command listener");
                    return Ok(());
                }

                next = stream.next() => match next {
                    Some(Ok(envelope)) => self.handle(&envelope).await,
                    Some(Err(e)) => warn!("Message stream error: {}", e),
                    None => {
                        warn!("Message stream ended");
                        return Ok(());
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alert_watch::{
        AlertFeed, AlertStream, FeedError, Notification, RecordingNotifier, RegionState, Snapshot,
        StateCache, StreamScope, WatchConfig, WatchMode,
    };
    use async_trait::async_trait;
    use futures::stream;
    use signal_daemon::{DataMessage, GroupInfo};

    use super::*;

    const BOT: &str = "+15559999";

    /// Feed that always returns the same data and never emits live updates.
    struct StaticFeed(Snapshot);

    #[async_trait]
    impl AlertFeed for StaticFeed {
        async fn fetch_all(&self) -> Result<Snapshot, FeedError> {
            Ok(self.0.clone())
        }

        async fn fetch_one(&self, region_id: RegionId) -> Result<RegionState, FeedError> {
            self.0.get(region_id).cloned().ok_or(FeedError::NotFound(region_id))
        }

        fn open_stream(&self, _scope: StreamScope) -> Result<AlertStream, FeedError> {
            Ok(stream::pending().boxed())
        }
    }

    fn kyiv() -> RegionState {
        RegionState {
            id: 25,
            name: "м. Київ".to_string(),
            name_en: "Kyiv".to_string(),
            alert: false,
            changed: String::new(),
        }
    }

    fn listener() -> (CommandListener, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        let feed = StaticFeed(Snapshot::from_states(vec![kyiv()]));
        let controller = SubscriptionController::new(
            Arc::new(feed),
            Arc::new(notifier.clone()),
            StateCache::new(),
            WatchConfig::default(),
        );
        (CommandListener::new(controller, 25, BOT), notifier)
    }

    fn direct(sender: &str, name: Option<&str>, text: &str) -> Envelope {
        Envelope {
            source: sender.to_string(),
            source_number: Some(sender.to_string()),
            source_name: name.map(str::to_string),
            timestamp: 1234567890,
            data_message: Some(DataMessage {
                message: Some(text.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn group(sender: &str, text: &str, group_id: &str) -> Envelope {
        let mut envelope = direct(sender, None, text);
        if let Some(data) = envelope.data_message.as_mut() {
            data.group_info = Some(GroupInfo {
                group_id: group_id.to_string(),
                ..Default::default()
            });
        }
        envelope
    }

    #[test]
    fn test_interpret_direct_command() {
        let (listener, _) = listener();
        let inbound = listener.interpret(&direct("+15550001", None, "/start 7")).unwrap();
        assert_eq!(inbound.subscriber, SubscriberId::direct("+15550001"));
        assert_eq!(inbound.command, Command::StartSingleRegionPoll(7));
    }

    #[test]
    fn test_interpret_group_command() {
        let (listener, _) = listener();
        let inbound = listener.interpret(&group("+15550001", "/startall", "Z3JvdXA=")).unwrap();
        assert_eq!(inbound.subscriber, SubscriberId::group("Z3JvdXA="));
        assert_eq!(inbound.command, Command::StartAllRegionsPoll);
    }

    #[test]
    fn test_interpret_skips_own_and_chatter() {
        let (listener, _) = listener();
        assert!(listener.interpret(&direct(BOT, None, "/start")).is_none());
        assert!(listener.interpret(&direct("+15550001", None, "good morning")).is_none());
        assert!(listener.interpret(&Envelope::default()).is_none());
    }

    #[tokio::test]
    async fn test_greeting_uses_profile_name() {
        let (listener, notifier) = listener();
        listener
            .handle(&direct("+15550001", Some("Olena"), "AirRaidovych | hello"))
            .await;
        listener
            .handle(&direct("+15550002", None, "AirRaidovych | hello"))
            .await;

        assert_eq!(
            notifier.sent_to(&SubscriberId::direct("+15550001")),
            vec![Notification::Text("Hello, Olena".to_string())]
        );
        assert_eq!(
            notifier.sent_to(&SubscriberId::direct("+15550002")),
            vec![Notification::Text("Hello, +15550002".to_string())]
        );
    }

    #[tokio::test]
    async fn test_dump_replies_with_snapshot() {
        let (listener, notifier) = listener();
        listener.controller.refresh().await.unwrap();
        listener.handle(&direct("+15550001", None, "/states")).await;

        let sent = notifier.sent_to(&SubscriberId::direct("+15550001"));
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Notification::Text(text) => assert!(text.contains("м. Київ")),
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_start_and_stop_commands() {
        let (listener, _) = listener();
        let alice = SubscriberId::direct("+15550001");

        listener.handle(&direct("+15550001", None, "/startall2")).await;
        assert_eq!(
            listener.controller.registry().get(&alice).await.unwrap().mode,
            WatchMode::AllRegionsPush
        );

        listener.handle(&direct("+15550001", None, "/stop")).await;
        assert!(listener.controller.registry().get(&alice).await.is_none());
    }
}
