//! Handles to running watches.

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::warn;

/// A spawned watch task and its cancellation token.
#[derive(Debug)]
pub struct WatchTask {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl WatchTask {
    pub fn new(cancel: CancellationToken, join: JoinHandle<()>) -> Self {
        Self { cancel, join }
    }

    /// Cancel the task and wait until it is gone.
    ///
    /// When this returns the task can no longer tick, receive events or send
    /// notifications, even if a network response was in flight.
    pub async fn cancel(self) {
        self.cancel.cancel();
        self.join.abort();
        match self.join.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!("Watch task panicked: {}", e),
        }
    }
}

/// One live stream connection of a push watch.
///
/// Cloning yields another handle to the same connection.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    connection: u64,
    cancel: CancellationToken,
}

impl StreamHandle {
    pub fn new(connection: u64, cancel: CancellationToken) -> Self {
        Self { connection, cancel }
    }

    /// Identifier of this connection; changes on every reconnect.
    pub fn connection(&self) -> u64 {
        self.connection
    }

    /// Close the connection.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Resolves once the connection is closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

/// Kind of a watch handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    Poll,
    Push,
}

/// Handle to an active watch, owned by exactly one subscription.
#[derive(Debug)]
pub enum WatchHandle {
    /// A repeating timer.
    Poll(WatchTask),
    /// A live stream supervisor and its current connection.
    Push { task: WatchTask, stream: StreamHandle },
}

impl WatchHandle {
    pub fn kind(&self) -> HandleKind {
        match self {
            WatchHandle::Poll(_) => HandleKind::Poll,
            WatchHandle::Push { .. } => HandleKind::Push,
        }
    }

    /// Current stream connection id for push handles.
    pub fn connection(&self) -> Option<u64> {
        match self {
            WatchHandle::Poll(_) => None,
            WatchHandle::Push { stream, .. } => Some(stream.connection()),
        }
    }

    /// Release the handle: cancel the timer, or close the stream and its supervisor.
    pub async fn close(self) {
        match self {
            WatchHandle::Poll(task) => task.cancel().await,
            WatchHandle::Push { task, stream } => {
                stream.close();
                task.cancel().await;
            }
        }
    }
}
