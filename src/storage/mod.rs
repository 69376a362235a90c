//! Storage contract and its coordinator-backed implementation.
//!
//! Callers address records by keys relative to a store prefix. The
//! [`Store`] namespaces every key, encodes objects through the
//! [`Object`](crate::Object) contract, and relies on coordinator revisions
//! for concurrency control:
//!
//! - create: one transaction guarded by `create_revision == 0`
//! - update / delete: read, then a transaction guarded by the observed
//!   `mod_revision`, retried on conflict per [`RetryPolicies`](crate::RetryPolicies)
//! - watch: a background listener per handle, see [`crate::watch`]

mod keys;
mod store;


pub use keys::*;
pub use store::*;

use crate::Object;
use crate::Result;
use crate::WatchHandle;

/// Outcome of a [`Storage::get_list`] scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListSummary {
    /// Records decoded and appended to the output list
    pub listed: usize,
    /// Records skipped because they failed to decode
    pub skipped: usize,
}

impl ListSummary {
    pub fn is_complete(&self) -> bool {
        self.skipped == 0
    }
}

/// Names a kind of record, e.g. `auth/users`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    pub fn new(
        group: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }
}

impl std::fmt::Display for GroupResource {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}/{}", self.group, self.resource)
    }
}

/// Generic object storage.
///
/// All keys are relative to the implementation's prefix. Operations are
/// cancelled by dropping their future.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Stores `obj` at `key` unless the key already exists.
    ///
    /// # Errors
    /// - [`Error::AlreadyExists`](crate::Error::AlreadyExists) if any record is present
    async fn create<O: Object>(
        &self,
        key: &str,
        obj: &O,
    ) -> Result<()>;

    /// Decodes the record at `key` into `out`.
    ///
    /// `out` is left untouched when the call fails.
    async fn get<O: Object>(
        &self,
        key: &str,
        out: &mut O,
    ) -> Result<()>;

    /// Appends every decodable record under the prefix to `list`, each
    /// decoded into a clone of `ref_obj`.
    async fn get_list<O: Object>(
        &self,
        ref_obj: &O,
        list: &mut Vec<O>,
    ) -> Result<ListSummary>;

    /// Replaces the record at `key` with `obj`, fenced on the observed revision.
    async fn update<O: Object>(
        &self,
        key: &str,
        obj: &O,
    ) -> Result<()>;

    /// Removes the record at `key`, fenced on the observed revision.
    async fn delete(
        &self,
        key: &str,
    ) -> Result<()>;

    /// Starts a live event stream over every key under `key`.
    ///
    /// An empty `key` watches the whole prefix. Only changes made after the
    /// call returns are reported.
    async fn watch<O: Object>(
        &self,
        key: &str,
        ref_obj: &O,
    ) -> Result<WatchHandle<O>>;
}
