//! Background listener turning a coordinator change stream into typed events.
//!
//! # Lifecycle
//!
//! ```text
//! Listening ──stop / parent cancel / stream closed──▶ Stopped
//!     │
//!     └──coordinator cancels the stream──▶ Error event ──▶ Errored
//! ```
//!
//! A record that fails to decode produces a single `Error` event and the
//! listener keeps going; only the loss of the stream itself ends it.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::WatchEvent;
use crate::coordinator::ChangeStream;
use crate::coordinator::MutationEvent;
use crate::coordinator::MutationKind;
use crate::storage::watch_covers;
use crate::metrics::GaugeGuard;
use crate::metrics::ACTIVE_WATCHERS;
use crate::metrics::WATCH_EVENTS_TOTAL;
use crate::Object;
use crate::ObjectError;

/// Why the listener loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListenerExit {
    /// Stop requested by the handle or an ancestor token
    Stopped,
    /// Coordinator closed the subscription without error
    StreamClosed,
    /// Coordinator cancelled the subscription; an `Error` event was emitted
    Errored,
    /// Nobody is reading events any more
    ReceiverDropped,
}

pub(crate) struct WatchTranslator<O: Object> {
    /// Coordinator prefix being watched
    watch_prefix: String,
    /// Store prefix, stripped from event keys
    store_prefix: String,
    ref_obj: O,
    stream: ChangeStream,
    sender: mpsc::Sender<WatchEvent<O>>,
    cancel: CancellationToken,
}

impl<O: Object> WatchTranslator<O> {
    pub(crate) fn new(
        watch_prefix: String,
        store_prefix: String,
        ref_obj: O,
        stream: ChangeStream,
        sender: mpsc::Sender<WatchEvent<O>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            watch_prefix,
            store_prefix,
            ref_obj,
            stream,
            sender,
            cancel,
        }
    }

    /// Runs until stopped, the coordinator ends the stream, or the handle is gone.
    pub(crate) async fn run(mut self) -> ListenerExit {
        // Released on return and when the task is aborted mid-await
        let _active = GaugeGuard::new(&ACTIVE_WATCHERS);
        debug!(prefix = %self.watch_prefix, "Watch listener started");

        let exit = self.listen().await;

        debug!(prefix = %self.watch_prefix, ?exit, "Watch listener stopped");
        exit
    }

    async fn listen(&mut self) -> ListenerExit {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return ListenerExit::Stopped,
                next = self.stream.next() => next,
            };

            match next {
                None => return ListenerExit::StreamClosed,
                Some(Err(e)) => {
                    warn!(prefix = %self.watch_prefix, error = %e, "Change stream cancelled by coordinator");
                    let reason = e.to_string();
                    return match self.deliver(WatchEvent::Error { reason }).await {
                        Ok(()) => ListenerExit::Errored,
                        Err(exit) => exit,
                    };
                }
                Some(Ok(batch)) => {
                    for mutation in batch {
                        if !watch_covers(&self.watch_prefix, &mutation.kv.key) {
                            trace!(key = %mutation.kv.key, "Skipping key outside watch");
                            continue;
                        }
                        let event = self.translate(mutation);
                        if let Err(exit) = self.deliver(event).await {
                            return exit;
                        }
                    }
                }
            }
        }
    }

    pub(crate) fn translate(
        &self,
        mutation: MutationEvent,
    ) -> WatchEvent<O> {
        let key = self.relative_key(&mutation.kv.key);
        trace!(
            key = %mutation.kv.key,
            kind = ?mutation.kind,
            create_revision = mutation.kv.create_revision,
            mod_revision = mutation.kv.mod_revision,
            "Translating mutation"
        );

        match mutation.kind {
            MutationKind::Put => match self.decode(&mutation.kv.value) {
                Ok(object) if mutation.kv.create_revision == mutation.kv.mod_revision => {
                    WatchEvent::Added { key, object }
                }
                Ok(object) => WatchEvent::Modified { key, object },
                Err(e) => self.decode_failure(&key, e),
            },
            MutationKind::Delete => match mutation.prev_kv {
                Some(prev) => match self.decode(&prev.value) {
                    Ok(object) => WatchEvent::Deleted { key, object },
                    Err(e) => self.decode_failure(&key, e),
                },
                None => {
                    warn!(%key, "Delete mutation without previous value");
                    WatchEvent::Error {
                        reason: format!("delete of {key} carried no previous value"),
                    }
                }
            },
        }
    }

    fn decode(
        &self,
        data: &[u8],
    ) -> Result<O, ObjectError> {
        let mut object = self.ref_obj.clone_object();
        object.decode(data)?;
        Ok(object)
    }

    fn decode_failure(
        &self,
        key: &str,
        err: ObjectError,
    ) -> WatchEvent<O> {
        warn!(%key, error = %err, "Watch event failed to decode");
        WatchEvent::Error {
            reason: format!("{key}: {err}"),
        }
    }

    fn relative_key(
        &self,
        key: &str,
    ) -> String {
        key.strip_prefix(self.store_prefix.as_str()).unwrap_or(key).to_string()
    }

    /// Blocks while the queue is full; gives up as soon as stop is requested.
    async fn deliver(
        &mut self,
        event: WatchEvent<O>,
    ) -> Result<(), ListenerExit> {
        let event_type = event.event_type();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ListenerExit::Stopped),
            sent = self.sender.send(event) => match sent {
                Ok(()) => {
                    WATCH_EVENTS_TOTAL.with_label_values(&[event_type.as_str()]).inc();
                    Ok(())
                }
                Err(_) => {
                    debug!(prefix = %self.watch_prefix, "Watch receiver dropped");
                    Err(ListenerExit::ReceiverDropped)
                }
            },
        }
    }
}
