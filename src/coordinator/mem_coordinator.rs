//! In-process coordinator with etcd revision semantics.
//!
//! All writes are serialized under a single lock which also hands each
//! resulting mutation to the subscribers whose prefix covers it, so every
//! subscriber observes its mutations in revision order. Each subscriber owns
//! its queue: a slow reader only holds back its own mutations and is never
//! cancelled for falling behind. Only [`MemCoordinator::cancel_watchers`]
//! ends a change stream with an error.

use std::collections::BTreeMap;

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::ChangeStream;
use super::Compare;
use super::Coordinator;
use super::KeyValue;
use super::MutationEvent;
use super::MutationKind;
use super::Txn;
use super::TxnOp;
use super::TxnResponse;
use crate::CoordinatorError;
use crate::CoordinatorResult;

#[derive(Debug, Clone)]
enum Notice {
    Mutation(MutationEvent),
    Cancel(String),
}

#[derive(Debug)]
struct Subscriber {
    prefix: String,
    sender: mpsc::UnboundedSender<Notice>,
}

#[derive(Debug, Default)]
struct MemState {
    /// Revision of the last applied write; 0 before any write
    revision: i64,
    data: BTreeMap<String, KeyValue>,
    subscribers: Vec<Subscriber>,
}

impl MemState {
    fn evaluate(
        &self,
        compare: &Compare,
    ) -> bool {
        match compare {
            Compare::CreateRevision { key, revision } => {
                self.data.get(key).map(|kv| kv.create_revision).unwrap_or(0) == *revision
            }
            Compare::ModRevision { key, revision } => {
                self.data.get(key).map(|kv| kv.mod_revision).unwrap_or(0) == *revision
            }
        }
    }

    /// Applies `op`, returning the mutation it produced (None for a no-op delete)
    fn apply(
        &mut self,
        op: TxnOp,
    ) -> Option<MutationEvent> {
        match op {
            TxnOp::Put { key, value } => {
                self.revision += 1;
                let revision = self.revision;
                let kv = match self.data.get(&key) {
                    Some(existing) => KeyValue {
                        key: key.clone(),
                        value,
                        create_revision: existing.create_revision,
                        mod_revision: revision,
                        version: existing.version + 1,
                    },
                    None => KeyValue {
                        key: key.clone(),
                        value,
                        create_revision: revision,
                        mod_revision: revision,
                        version: 1,
                    },
                };
                self.data.insert(key, kv.clone());
                Some(MutationEvent {
                    kind: MutationKind::Put,
                    kv,
                    prev_kv: None,
                })
            }
            TxnOp::Delete { key } => {
                let prev = self.data.remove(&key)?;
                self.revision += 1;
                Some(MutationEvent {
                    kind: MutationKind::Delete,
                    kv: KeyValue {
                        key,
                        value: Bytes::new(),
                        create_revision: 0,
                        mod_revision: self.revision,
                        version: 0,
                    },
                    prev_kv: Some(prev),
                })
            }
        }
    }

    /// Queues `event` for every subscriber whose prefix covers its key and
    /// forgets subscribers whose stream is gone.
    fn publish(
        &mut self,
        event: MutationEvent,
    ) {
        self.subscribers.retain(|subscriber| {
            if !event.kv.key.starts_with(&subscriber.prefix) {
                return !subscriber.sender.is_closed();
            }
            subscriber.sender.send(Notice::Mutation(event.clone())).is_ok()
        });
    }
}

/// Revisioned in-memory key-value coordinator
#[derive(Debug, Default)]
pub struct MemCoordinator {
    state: Mutex<MemState>,
}

impl MemCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current coordinator revision
    pub fn revision(&self) -> i64 {
        self.state.lock().revision
    }

    pub fn len(&self) -> usize {
        self.state.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of open change streams
    pub fn watcher_count(&self) -> usize {
        self.state
            .lock()
            .subscribers
            .iter()
            .filter(|s| !s.sender.is_closed())
            .count()
    }

    /// Cancels every open change stream from the coordinator side.
    ///
    /// Subscribers receive a terminal [`CoordinatorError::WatchCanceled`]
    /// after the mutations already queued for them.
    pub fn cancel_watchers(
        &self,
        reason: impl Into<String>,
    ) {
        let reason = reason.into();
        warn!(%reason, "Cancelling all watchers");
        let mut state = self.state.lock();
        for subscriber in state.subscribers.drain(..) {
            let _ = subscriber.sender.send(Notice::Cancel(reason.clone()));
        }
    }

    /// Writes `value` at `key` unconditionally
    pub fn put(
        &self,
        key: impl Into<String>,
        value: impl Into<Bytes>,
    ) -> i64 {
        let mut state = self.state.lock();
        if let Some(event) = state.apply(TxnOp::put(key, value)) {
            state.publish(event);
        }
        state.revision
    }
}

#[async_trait::async_trait]
impl Coordinator for MemCoordinator {
    async fn get(
        &self,
        key: &str,
    ) -> CoordinatorResult<Option<KeyValue>> {
        Ok(self.state.lock().data.get(key).cloned())
    }

    async fn get_prefix(
        &self,
        prefix: &str,
    ) -> CoordinatorResult<Vec<KeyValue>> {
        let state = self.state.lock();
        Ok(state
            .data
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, kv)| kv.clone())
            .collect())
    }

    async fn txn(
        &self,
        txn: Txn,
    ) -> CoordinatorResult<TxnResponse> {
        let mut state = self.state.lock();

        if !state.evaluate(&txn.compare) {
            trace!(compare = ?txn.compare, "Txn compare failed");
            return Ok(TxnResponse {
                succeeded: false,
                revision: state.revision,
            });
        }

        if let Some(event) = state.apply(txn.success) {
            trace!(key = %event.kv.key, revision = event.kv.mod_revision, "Txn applied");
            state.publish(event);
        }

        Ok(TxnResponse {
            succeeded: true,
            revision: state.revision,
        })
    }

    async fn watch_prefix(
        &self,
        prefix: &str,
    ) -> CoordinatorResult<ChangeStream> {
        // Register under the write lock so the stream starts exactly at the current revision
        let (sender, receiver) = mpsc::unbounded_channel();
        {
            let mut state = self.state.lock();
            debug!(prefix, revision = state.revision, "Watch registered");
            state.subscribers.push(Subscriber {
                prefix: prefix.to_string(),
                sender,
            });
        }

        let stream = futures::stream::unfold(Some(receiver), |receiver| async move {
            let mut receiver = receiver?;
            match receiver.recv().await? {
                Notice::Mutation(event) => Some((Ok(vec![event]), Some(receiver))),
                Notice::Cancel(reason) => {
                    Some((Err(CoordinatorError::WatchCanceled { reason }), None))
                }
            }
        });

        Ok(stream.boxed())
    }
}
