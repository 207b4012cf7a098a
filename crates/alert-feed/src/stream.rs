//! Live alert stream over Server-Sent Events.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream};
use reqwest_eventsource::{Event, EventSource};
use tracing::{debug, info, warn};

use crate::error::FeedError;
use crate::types::{RegionId, RegionState, UpdatePayload};

/// SSE event type carrying region updates.
pub const UPDATE_EVENT: &str = "update";

/// Which regions a live stream covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamScope {
    /// Every region.
    AllRegions,
    /// One region.
    Region(RegionId),
}

/// An item produced by a live stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The connection is established.
    Opened,
    /// A region changed.
    Update(RegionState),
}

/// A boxed live stream as returned by [`crate::AlertFeed::open_stream`].
pub type AlertStream = BoxStream<'static, Result<StreamEvent, FeedError>>;

/// Adapter from an [`EventSource`] to decoded [`StreamEvent`]s.
///
/// Unlike a bare `EventSource`, this stream does not retry on its own: the
/// first transport error is yielded once, the connection is closed and the
/// stream ends. Undecodable `update` payloads are logged and skipped.
pub struct EventStream {
    event_source: EventSource,
    scope: StreamScope,
    done: bool,
}

impl EventStream {
    /// Wrap an event source.
    pub fn new(event_source: EventSource, scope: StreamScope) -> Self {
        Self {
            event_source,
            scope,
            done: false,
        }
    }

    fn close(&mut self) {
        self.event_source.close();
        self.done = true;
    }
}

impl Stream for EventStream {
    type Item = Result<StreamEvent, FeedError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut self.event_source).poll_next(cx) {
                Poll::Ready(Some(Ok(Event::Open))) => {
                    debug!(scope = ?self.scope, "Live stream opened");
                    return Poll::Ready(Some(Ok(StreamEvent::Opened)));
                }
                Poll::Ready(Some(Ok(Event::Message(msg)))) => {
                    if msg.event != UPDATE_EVENT {
                        debug!("Ignoring SSE event type: {}", msg.event);
                        continue;
                    }
                    match serde_json::from_str::<UpdatePayload>(&msg.data) {
                        Ok(payload) => {
                            return Poll::Ready(Some(Ok(StreamEvent::Update(payload.into_state()))));
                        }
                        Err(e) => {
                            warn!("Failed to decode update payload: {}", e);
                            debug!("Raw data: {}", msg.data);
                            continue;
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!(scope = ?self.scope, "Live stream error: {}", e);
                    self.close();
                    return Poll::Ready(Some(Err(FeedError::Stream(e.to_string()))));
                }
                Poll::Ready(None) => {
                    info!(scope = ?self.scope, "Live stream ended");
                    self.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
