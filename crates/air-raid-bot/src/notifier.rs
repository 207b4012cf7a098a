//! Notifier backed by the signal-cli daemon.

use alert_watch::{Notifier, SubscriberId, WatchError};
use async_trait::async_trait;
use signal_daemon::{Recipient, SignalClient};
use tracing::debug;

/// Map a subscriber to the daemon's recipient type.
pub fn recipient_for(subscriber: &SubscriberId) -> Recipient {
    if subscriber.is_group {
        Recipient::Group(subscriber.recipient.clone())
    } else {
        Recipient::Direct(subscriber.recipient.clone())
    }
}

/// Map a reply target back to the subscriber it identifies.
pub fn subscriber_for(recipient: &Recipient) -> SubscriberId {
    match recipient {
        Recipient::Direct(number) => SubscriberId::direct(number.clone()),
        Recipient::Group(id) => SubscriberId::group(id.clone()),
    }
}

/// Delivers notifications as Signal messages.
#[derive(Debug, Clone)]
pub struct SignalNotifier {
    client: SignalClient,
}

impl SignalNotifier {
    pub fn new(client: SignalClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for SignalNotifier {
    async fn send_text(&self, to: &SubscriberId, text: &str) -> Result<(), WatchError> {
        let result = self
            .client
            .send_message(&recipient_for(to), text)
            .await
            .map_err(|e| WatchError::Notify(e.to_string()))?;
        debug!(subscriber = %to, timestamp = result.timestamp, "Text sent");
        Ok(())
    }

    async fn send_sticker(&self, to: &SubscriberId, sticker_id: &str) -> Result<(), WatchError> {
        let result = self
            .client
            .send_sticker(&recipient_for(to), sticker_id)
            .await
            .map_err(|e| WatchError::Notify(e.to_string()))?;
        debug!(subscriber = %to, timestamp = result.timestamp, "Sticker sent");
        Ok(())
    }
}
