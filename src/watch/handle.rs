use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::translator::ListenerExit;
use super::WatchEvent;

/// Caller side of one watch.
///
/// Events arrive through a bounded queue fed by a dedicated listener task.
/// The sequence ends after [`stop`](WatchHandle::stop), after the store is
/// shut down, or after the coordinator cancels the watch (in which case the
/// last event is [`WatchEvent::Error`]). A finished watch is not restarted in
/// place; call `watch` again.
///
/// Dropping the handle stops the listener.
pub struct WatchHandle<O> {
    key: String,
    receiver: mpsc::Receiver<WatchEvent<O>>,
    cancel: CancellationToken,
    listener: Option<JoinHandle<ListenerExit>>,
}

impl<O> std::fmt::Debug for WatchHandle<O> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("key", &self.key)
            .field("stopped", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<O> WatchHandle<O> {
    pub(crate) fn new(
        key: String,
        receiver: mpsc::Receiver<WatchEvent<O>>,
        cancel: CancellationToken,
        listener: JoinHandle<ListenerExit>,
    ) -> Self {
        Self {
            key,
            receiver,
            cancel,
            listener: Some(listener),
        }
    }

    /// Caller-relative key this watch was opened on
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Next event, or `None` once the watch has ended and the queue is drained
    pub async fn recv(&mut self) -> Option<WatchEvent<O>> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](WatchHandle::recv).
    ///
    /// [`TryRecvError::Empty`] means the watch is live but nothing is queued;
    /// [`TryRecvError::Disconnected`] means it has ended and the queue is
    /// drained.
    pub fn try_recv(&mut self) -> Result<WatchEvent<O>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Stops the listener.
    ///
    /// Idempotent and non-blocking. Events already queued stay readable; no
    /// further events are produced and no termination event is emitted.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!(key = %self.key, "Watch stop requested");
        }
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that stops this watch, for use from another task while this
    /// handle is busy receiving
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops the listener and waits for its task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(listener) = self.listener.take() {
            match listener.await {
                Ok(exit) => debug!(key = %self.key, ?exit, "Watch listener joined"),
                Err(e) => debug!(key = %self.key, error = %e, "Watch listener aborted"),
            }
        }
    }

    /// Whether the listener task has exited
    pub fn is_finished(&self) -> bool {
        self.listener.as_ref().map(|l| l.is_finished()).unwrap_or(true)
    }
}

impl<O> Stream for WatchHandle<O> {
    type Item = WatchEvent<O>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl<O> Drop for WatchHandle<O> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
