//! Server-Sent Events (SSE) client for receiving messages.

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use futures::stream::Stream;
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use tokio::time::{sleep, Sleep};
use tracing::{debug, error, info, warn};

use crate::config::DaemonConfig;
use crate::error::DaemonError;
use crate::types::{Envelope, ReceiveEvent};
use crate::SignalClient;

/// SSE event name carrying incoming envelopes.
const RECEIVE_EVENT: &str = "receive";

/// Configuration for automatic reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of retries (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier for each retry.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }

    /// Check if we should retry after the given number of attempts.
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.max_retries.map_or(true, |max| attempts < max)
    }
}

/// A stream of incoming Signal message envelopes.
///
/// Connection failures are yielded as `Err` items and followed by a reconnect
/// after the configured backoff. The stream only ends once the retry budget
/// is spent.
pub struct MessageStream {
    http: reqwest::Client,
    config: DaemonConfig,
    reconnect_config: ReconnectConfig,
    event_source: Option<EventSource>,
    backoff: Option<Pin<Box<Sleep>>>,
    reconnect_attempts: u32,
    exhausted: bool,
}

impl MessageStream {
    /// Create a new message stream from a SignalClient.
    pub fn new(client: &SignalClient) -> Result<Self, DaemonError> {
        Self::with_reconnect(client, ReconnectConfig::default())
    }

    /// Create a new message stream with custom reconnection config.
    pub fn with_reconnect(
        client: &SignalClient,
        reconnect_config: ReconnectConfig,
    ) -> Result<Self, DaemonError> {
        // Long-lived connection, so no request timeout
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            config: client.config().clone(),
            reconnect_config,
            event_source: None,
            backoff: None,
            reconnect_attempts: 0,
            exhausted: false,
        })
    }

    fn open(&self) -> Result<EventSource, DaemonError> {
        let url = self.config.events_url();
        info!("Opening SSE connection to {}", url);
        self.http
            .get(&url)
            .eventsource()
            .map_err(|e| DaemonError::Sse(e.to_string()))
    }

    /// Drop the current connection and arm the backoff timer.
    fn schedule_reconnect(&mut self) {
        if let Some(mut source) = self.event_source.take() {
            source.close();
        }

        if !self.reconnect_config.should_retry(self.reconnect_attempts) {
            error!(
                "Giving up on SSE after {} reconnect attempts",
                self.reconnect_attempts
            );
            self.exhausted = true;
            return;
        }

        let delay = self.reconnect_config.delay_for_attempt(self.reconnect_attempts);
        self.reconnect_attempts += 1;
        warn!(
            "SSE reconnect attempt {} in {:?}",
            self.reconnect_attempts, delay
        );
        self.backoff = Some(Box::pin(sleep(delay)));
    }
}

impl Stream for MessageStream {
    type Item = Result<Envelope, DaemonError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.exhausted {
                return Poll::Ready(None);
            }

            if let Some(backoff) = this.backoff.as_mut() {
                ready!(backoff.as_mut().poll(cx));
                this.backoff = None;
            }

            if this.event_source.is_none() {
                match this.open() {
                    Ok(source) => this.event_source = Some(source),
                    Err(e) => {
                        this.schedule_reconnect();
                        return Poll::Ready(Some(Err(e)));
                    }
                }
            }
            let Some(source) = this.event_source.as_mut() else {
                continue;
            };

            match Pin::new(source).poll_next(cx) {
                Poll::Ready(Some(Ok(Event::Open))) => {
                    debug!("SSE connection opened");
                    this.reconnect_attempts = 0;
                }
                Poll::Ready(Some(Ok(Event::Message(msg)))) => {
                    if msg.event != RECEIVE_EVENT {
                        debug!("Ignoring SSE event type: {}", msg.event);
                        continue;
                    }
                    match serde_json::from_str::<ReceiveEvent>(&msg.data) {
                        Ok(event) => return Poll::Ready(Some(Ok(event.envelope))),
                        Err(e) => {
                            warn!("Failed to parse SSE event data: {}", e);
                            debug!("Raw data: {}", msg.data);
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    error!("SSE error: {}", e);
                    this.schedule_reconnect();
                    return Poll::Ready(Some(Err(DaemonError::Sse(e.to_string()))));
                }
                Poll::Ready(None) => {
                    info!("SSE stream ended");
                    this.schedule_reconnect();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Create a message stream from a SignalClient.
pub fn subscribe(client: &SignalClient) -> Result<MessageStream, DaemonError> {
    MessageStream::new(client)
}

/// Create a message stream with custom reconnection configuration.
pub fn subscribe_with_reconnect(
    client: &SignalClient,
    reconnect_config: ReconnectConfig,
) -> Result<MessageStream, DaemonError> {
    MessageStream::with_reconnect(client, reconnect_config)
}
