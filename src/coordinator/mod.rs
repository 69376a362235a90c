//! Coordinator protocol consumed by the store.
//!
//! A coordinator is a strongly consistent key-value service (etcd or
//! anything shaped like it). The store needs four things from it:
//!
//! - point reads and prefix scans returning revisioned records
//! - a single-compare transaction: "if this revision still equals X, do op"
//! - a change stream over a key prefix carrying put/delete mutations
//!
//! Every record carries a `create_revision` (assigned at first write) and a
//! `mod_revision` (bumped on every write). These are the only concurrency
//! tokens the store ever uses.
//!
//! # Implementations
//!
//! - [`MemCoordinator`]: in-process, revisioned, used by tests and embedded mode
//! - `EtcdCoordinator` (feature `etcd`): adapter over `etcd-client`

mod mem_coordinator;
pub use mem_coordinator::*;

#[cfg(feature = "etcd")]
mod etcd_coordinator;
#[cfg(feature = "etcd")]
pub use etcd_coordinator::*;


use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;

use crate::CoordinatorResult;

/// A revisioned record as returned by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Bytes,
    /// Revision of the write that created the key; 0 for a tombstone
    pub create_revision: i64,
    /// Revision of the last write to the key
    pub mod_revision: i64,
    /// Number of writes since creation
    pub version: i64,
}

/// Equality guard evaluated atomically with the transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compare {
    /// `create_revision(key) == revision`; 0 means "never written"
    CreateRevision { key: String, revision: i64 },
    /// `mod_revision(key) == revision`
    ModRevision { key: String, revision: i64 },
}

impl Compare {
    pub fn create_revision(
        key: impl Into<String>,
        revision: i64,
    ) -> Self {
        Compare::CreateRevision {
            key: key.into(),
            revision,
        }
    }

    pub fn mod_revision(
        key: impl Into<String>,
        revision: i64,
    ) -> Self {
        Compare::ModRevision {
            key: key.into(),
            revision,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Compare::CreateRevision { key, .. } | Compare::ModRevision { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOp {
    Put { key: String, value: Bytes },
    Delete { key: String },
}

impl TxnOp {
    pub fn put(
        key: impl Into<String>,
        value: impl Into<Bytes>,
    ) -> Self {
        TxnOp::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        TxnOp::Delete { key: key.into() }
    }
}

/// Conditional write: `success` is applied only if `compare` holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Txn {
    pub compare: Compare,
    pub success: TxnOp,
}

impl Txn {
    pub fn new(
        compare: Compare,
        success: TxnOp,
    ) -> Self {
        Self { compare, success }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnResponse {
    /// Whether the compare held and the op was applied
    pub succeeded: bool,
    /// Coordinator revision after the transaction
    pub revision: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Put,
    Delete,
}

/// One entry of the coordinator's mutation log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    pub kind: MutationKind,
    /// Post-mutation record. For deletes only `key` and `mod_revision` are meaningful.
    pub kv: KeyValue,
    /// Pre-mutation record, captured for deletes
    pub prev_kv: Option<KeyValue>,
}

/// Change stream over a key prefix.
///
/// Yields batches in revision order. An `Err` item means the coordinator
/// cancelled the watch and is always the last item. The stream ends without
/// error when the subscription is closed on the coordinator side.
pub type ChangeStream = BoxStream<'static, CoordinatorResult<Vec<MutationEvent>>>;

/// Client side of the coordinator protocol.
///
/// Implementations must be safe for concurrent use by many store operations
/// and watch listeners without external locking.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Coordinator: Send + Sync + 'static {
    /// Point read
    async fn get(
        &self,
        key: &str,
    ) -> CoordinatorResult<Option<KeyValue>>;

    /// Every record whose key starts with `prefix`, in coordinator scan order
    async fn get_prefix(
        &self,
        prefix: &str,
    ) -> CoordinatorResult<Vec<KeyValue>>;

    /// Atomically evaluates `txn.compare` and applies `txn.success` if it holds
    async fn txn(
        &self,
        txn: Txn,
    ) -> CoordinatorResult<TxnResponse>;

    /// Subscribes to mutations under `prefix` from the current revision on.
    ///
    /// The subscription must be registered before this returns, so writes
    /// issued after the call are observed.
    async fn watch_prefix(
        &self,
        prefix: &str,
    ) -> CoordinatorResult<ChangeStream>;
}

#[async_trait::async_trait]
impl<C: Coordinator> Coordinator for Arc<C> {
    async fn get(
        &self,
        key: &str,
    ) -> CoordinatorResult<Option<KeyValue>> {
        self.as_ref().get(key).await
    }

    async fn get_prefix(
        &self,
        prefix: &str,
    ) -> CoordinatorResult<Vec<KeyValue>> {
        self.as_ref().get_prefix(prefix).await
    }

    async fn txn(
        &self,
        txn: Txn,
    ) -> CoordinatorResult<TxnResponse> {
        self.as_ref().txn(txn).await
    }

    async fn watch_prefix(
        &self,
        prefix: &str,
    ) -> CoordinatorResult<ChangeStream> {
        self.as_ref().watch_prefix(prefix).await
    }
}
