//! Scripted alert feed for controller tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alert_watch::{
    AlertFeed, AlertStream, FeedError, Notifier, RecordingNotifier, RegionId, RegionState, Snapshot,
    StreamEvent, StreamScope, SubscriberId, WatchError,
};
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use tokio::sync::Semaphore;

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Step<T> {
    Ok(T),
    Fail,
}

/// Pops scripted steps in order; the last step repeats forever.
#[derive(Debug)]
struct Script<T> {
    steps: Vec<Step<T>>,
    next: usize,
}

impl<T: Clone> Script<T> {
    fn new(steps: Vec<Step<T>>) -> Self {
        Self { steps, next: 0 }
    }

    fn pop(&mut self) -> Option<Step<T>> {
        let last = self.steps.len().checked_sub(1)?;
        let step = self.steps[self.next.min(last)].clone();
        self.next += 1;
        Some(step)
    }
}

type StreamSender = UnboundedSender<Result<StreamEvent, FeedError>>;

/// An in-memory [`AlertFeed`] driven by the test.
#[derive(Default)]
pub struct ScriptedFeed {
    all: Mutex<Option<Script<Snapshot>>>,
    one: Mutex<HashMap<RegionId, Script<RegionState>>>,
    all_calls: Mutex<usize>,
    one_calls: Mutex<HashMap<RegionId, usize>>,
    streams: Mutex<Vec<(StreamScope, StreamSender)>>,
    gate: Option<Arc<Semaphore>>,
    refuse_streams: bool,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_all(self, steps: Vec<Step<Snapshot>>) -> Self {
        *self.all.lock().unwrap() = Some(Script::new(steps));
        self
    }

    pub fn with_region(self, region: RegionId, steps: Vec<Step<RegionState>>) -> Self {
        self.one.lock().unwrap().insert(region, Script::new(steps));
        self
    }

    /// Make every pull wait for a permit on the returned semaphore.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Make `open_stream` fail.
    pub fn refusing_streams(mut self) -> Self {
        self.refuse_streams = true;
        self
    }

    pub fn all_calls(&self) -> usize {
        *self.all_calls.lock().unwrap()
    }

    pub fn one_calls(&self, region: RegionId) -> usize {
        self.one_calls.lock().unwrap().get(&region).copied().unwrap_or(0)
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    pub fn stream_scope(&self, index: usize) -> StreamScope {
        self.streams.lock().unwrap()[index].0
    }

    pub fn stream_sender(&self, index: usize) -> StreamSender {
        self.streams.lock().unwrap()[index].1.clone()
    }

    /// Whether the consumer of the `index`th stream has dropped it.
    pub fn stream_closed(&self, index: usize) -> bool {
        self.streams.lock().unwrap()[index].1.is_closed()
    }

    /// Push an event into the `index`th opened stream.
    pub fn emit(&self, index: usize, event: Result<StreamEvent, FeedError>) {
        let _ = self.stream_sender(index).unbounded_send(event);
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
    }
}

fn unavailable() -> FeedError {
    FeedError::Status {
        status: 503,
        body: "unavailable".to_string(),
    }
}

#[async_trait]
impl AlertFeed for ScriptedFeed {
    async fn fetch_all(&self) -> Result<Snapshot, FeedError> {
        *self.all_calls.lock().unwrap() += 1;
        self.pass_gate().await;
        let step = self.all.lock().unwrap().as_mut().and_then(Script::pop);
        match step {
            Some(Step::Ok(snapshot)) => Ok(snapshot),
            Some(Step::Fail) | None => Err(unavailable()),
        }
    }

    async fn fetch_one(&self, region_id: RegionId) -> Result<RegionState, FeedError> {
        *self.one_calls.lock().unwrap().entry(region_id).or_default() += 1;
        self.pass_gate().await;
        let step = self
            .one
            .lock()
            .unwrap()
            .get_mut(&region_id)
            .and_then(Script::pop);
        match step {
            Some(Step::Ok(state)) => Ok(state),
            Some(Step::Fail) => Err(unavailable()),
            None => Err(FeedError::NotFound(region_id)),
        }
    }

    fn open_stream(&self, scope: StreamScope) -> Result<AlertStream, FeedError> {
        if self.refuse_streams {
            return Err(FeedError::Stream("refused".to_string()));
        }
        let (tx, rx) = unbounded();
        self.streams.lock().unwrap().push((scope, tx));
        Ok(rx.boxed())
    }
}

/// A recording notifier that holds sends to some subscribers until a permit
/// is added to the returned semaphore.
pub struct GatedNotifier {
    inner: RecordingNotifier,
    held: Vec<SubscriberId>,
    gate: Arc<Semaphore>,
}

impl GatedNotifier {
    pub fn new(inner: RecordingNotifier, held: Vec<SubscriberId>) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let notifier = Self {
            inner,
            held,
            gate: Arc::clone(&gate),
        };
        (notifier, gate)
    }

    async fn pass_gate(&self, to: &SubscriberId) {
        if self.held.contains(to) {
            self.gate.acquire().await.unwrap().forget();
        }
    }
}

#[async_trait]
impl Notifier for GatedNotifier {
    async fn send_text(&self, to: &SubscriberId, text: &str) -> Result<(), WatchError> {
        self.pass_gate(to).await;
        self.inner.send_text(to, text).await
    }

    async fn send_sticker(&self, to: &SubscriberId, sticker_id: &str) -> Result<(), WatchError> {
        self.pass_gate(to).await;
        self.inner.send_sticker(to, sticker_id).await
    }
}

pub fn region(id: RegionId, alert: bool) -> RegionState {
    RegionState {
        id,
        name: format!("region-{}", id),
        name_en: format!("Region {}", id),
        alert,
        changed: String::new(),
    }
}

pub fn snapshot(states: &[(RegionId, bool)]) -> Snapshot {
    states.iter().map(|&(id, alert)| region(id, alert)).collect()
}

/// Let spawned watch tasks run until they are idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
