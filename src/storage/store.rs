use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::warn;

use super::keys::join_key;
use super::keys::normalize_prefix;
use super::keys::watch_prefix;
use super::GroupResource;
use super::ListSummary;
use super::Storage;
use crate::coordinator::Compare;
use crate::coordinator::Txn;
use crate::coordinator::TxnOp;
use crate::metrics::OperationTimer;
use crate::metrics::REVISION_CONFLICTS_TOTAL;
use crate::watch::translator::WatchTranslator;
use crate::BackoffPolicy;
use crate::Coordinator;
use crate::CoordinatorResult;
use crate::Error;
use crate::Object;
use crate::Result;
use crate::StoreConfig;
use crate::WatchHandle;

/// [`Storage`] over a revisioned coordinator.
///
/// Cheap to clone; clones share the coordinator client and the shutdown
/// token.
pub struct Store<C: Coordinator> {
    coordinator: Arc<C>,
    /// Normalized `/prefix/`
    path_prefix: String,
    config: StoreConfig,
    /// Parent of every watch listener spawned by this store
    shutdown: CancellationToken,
}

impl<C: Coordinator> Clone for Store<C> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            path_prefix: self.path_prefix.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<C: Coordinator> std::fmt::Debug for Store<C> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path_prefix", &self.path_prefix)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Coordinator> Store<C> {
    pub fn new(
        coordinator: Arc<C>,
        prefix: &str,
    ) -> Self {
        Self::with_config(coordinator, prefix, StoreConfig::default())
    }

    pub fn with_config(
        coordinator: Arc<C>,
        prefix: &str,
        config: StoreConfig,
    ) -> Self {
        let path_prefix = normalize_prefix(prefix);
        debug!(prefix = %path_prefix, "New store");
        Self {
            coordinator,
            path_prefix,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Store rooted at `group/resource`
    pub fn for_resource(
        coordinator: Arc<C>,
        resource: &GroupResource,
        config: StoreConfig,
    ) -> Self {
        Self::with_config(coordinator, &resource.to_string(), config)
    }

    /// Ties every watch of this store to `parent`: cancelling `parent`
    /// stops them all.
    pub fn with_cancellation(
        mut self,
        parent: &CancellationToken,
    ) -> Self {
        self.shutdown = parent.child_token();
        self
    }

    /// Stops every watch opened through this store or its clones
    pub fn shutdown(&self) {
        debug!(prefix = %self.path_prefix, "Store shutdown");
        self.shutdown.cancel();
    }

    pub fn prefix(&self) -> &str {
        &self.path_prefix
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<C> {
        &self.coordinator
    }

    /// Runs one coordinator round trip under the request timeout
    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = CoordinatorResult<T>>,
    ) -> Result<T> {
        let duration = self.config.coordinator.request_timeout();
        match timeout(duration, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(operation, error = %e, "Coordinator call failed");
                Err(e.into())
            }
            Err(_) => {
                warn!(operation, ?duration, "Coordinator call timed out");
                Err(Error::Timeout { operation, duration })
            }
        }
    }

    /// Read-then-compare loop shared by update and delete.
    ///
    /// Each attempt reads the current `mod_revision` and submits `op` guarded
    /// on it. A rejected guard backs off per `policy`; there is no sleep
    /// after the final attempt.
    async fn fenced_write(
        &self,
        operation: &'static str,
        key: &str,
        full_key: &str,
        policy: &BackoffPolicy,
        op: TxnOp,
    ) -> Result<()> {
        let mut attempt = 0usize;
        loop {
            let current = self
                .call("get", self.coordinator.get(full_key))
                .await?
                .ok_or_else(|| Error::NotFound { key: key.to_string() })?;

            let txn = Txn::new(Compare::mod_revision(full_key, current.mod_revision), op.clone());
            let response = self.call("txn", self.coordinator.txn(txn)).await?;
            if response.succeeded {
                debug!(key = %full_key, operation, attempt, revision = response.revision, "Fenced write applied");
                return Ok(());
            }

            REVISION_CONFLICTS_TOTAL.with_label_values(&[operation]).inc();
            warn!(
                key = %full_key,
                operation,
                attempt,
                mod_revision = current.mod_revision,
                "Revision conflict"
            );

            attempt += 1;
            if !policy.allows(attempt) {
                warn!(key = %full_key, operation, attempts = attempt, "Retries exhausted");
                return Err(Error::RetriesExhausted {
                    operation,
                    key: key.to_string(),
                    attempts: attempt,
                });
            }
            sleep(policy.delay_for(attempt - 1)).await;
        }
    }

    async fn do_create<O: Object>(
        &self,
        key: &str,
        obj: &O,
    ) -> Result<()> {
        let full_key = join_key(&self.path_prefix, key)?;
        let value = Bytes::from(obj.encode()?);
        debug!(key = %full_key, "Create");

        let txn = Txn::new(
            Compare::create_revision(&full_key, 0),
            TxnOp::put(&full_key, value),
        );
        let response = self.call("txn", self.coordinator.txn(txn)).await?;
        if !response.succeeded {
            debug!(key = %full_key, "Create rejected, key exists");
            return Err(Error::AlreadyExists { key: key.to_string() });
        }

        debug!(key = %full_key, revision = response.revision, "Created");
        Ok(())
    }

    async fn do_get<O: Object>(
        &self,
        key: &str,
        out: &mut O,
    ) -> Result<()> {
        let full_key = join_key(&self.path_prefix, key)?;
        debug!(key = %full_key, "Get");

        let kv = self
            .call("get", self.coordinator.get(&full_key))
            .await?
            .ok_or_else(|| Error::NotFound { key: key.to_string() })?;
        out.decode(&kv.value)?;
        Ok(())
    }

    async fn do_get_list<O: Object>(
        &self,
        ref_obj: &O,
        list: &mut Vec<O>,
    ) -> Result<ListSummary> {
        let kvs = self
            .call("get_prefix", self.coordinator.get_prefix(&self.path_prefix))
            .await?;

        let mut summary = ListSummary::default();
        for kv in kvs {
            let mut obj = ref_obj.clone_object();
            match obj.decode(&kv.value) {
                Ok(()) => {
                    list.push(obj);
                    summary.listed += 1;
                }
                Err(e) => {
                    warn!(key = %kv.key, error = %e, "Skipping undecodable record");
                    summary.skipped += 1;
                }
            }
        }

        debug!(prefix = %self.path_prefix, listed = summary.listed, skipped = summary.skipped, "Listed");
        Ok(summary)
    }

    async fn do_update<O: Object>(
        &self,
        key: &str,
        obj: &O,
    ) -> Result<()> {
        let full_key = join_key(&self.path_prefix, key)?;
        let value = Bytes::from(obj.encode()?);
        debug!(key = %full_key, "Update");

        let op = TxnOp::put(&full_key, value);
        self.fenced_write("update", key, &full_key, &self.config.retry.update, op)
            .await
    }

    async fn do_delete(
        &self,
        key: &str,
    ) -> Result<()> {
        let full_key = join_key(&self.path_prefix, key)?;
        debug!(key = %full_key, "Delete");

        let op = TxnOp::delete(&full_key);
        self.fenced_write("delete", key, &full_key, &self.config.retry.delete, op)
            .await
    }

    async fn do_watch<O: Object>(
        &self,
        key: &str,
        ref_obj: &O,
    ) -> Result<WatchHandle<O>> {
        let prefix = watch_prefix(&self.path_prefix, key)?;
        let stream = self
            .call("watch_prefix", self.coordinator.watch_prefix(&prefix))
            .await?;

        let (sender, receiver) = mpsc::channel(self.config.watch.event_buffer_size.max(1));
        let cancel = self.shutdown.child_token();
        let translator = WatchTranslator::new(
            prefix.clone(),
            self.path_prefix.clone(),
            ref_obj.clone_object(),
            stream,
            sender,
            cancel.clone(),
        );
        let listener = tokio::spawn(translator.run());

        debug!(%prefix, "Watch started");
        Ok(WatchHandle::new(key.to_string(), receiver, cancel, listener))
    }
}

#[async_trait::async_trait]
impl<C: Coordinator> Storage for Store<C> {
    async fn create<O: Object>(
        &self,
        key: &str,
        obj: &O,
    ) -> Result<()> {
        let timer = OperationTimer::new("create");
        let result = self.do_create(key, obj).await;
        timer.observe(&result);
        result
    }

    async fn get<O: Object>(
        &self,
        key: &str,
        out: &mut O,
    ) -> Result<()> {
        let timer = OperationTimer::new("get");
        let result = self.do_get(key, out).await;
        timer.observe(&result);
        result
    }

    async fn get_list<O: Object>(
        &self,
        ref_obj: &O,
        list: &mut Vec<O>,
    ) -> Result<ListSummary> {
        let timer = OperationTimer::new("get_list");
        let result = self.do_get_list(ref_obj, list).await;
        timer.observe(&result);
        result
    }

    async fn update<O: Object>(
        &self,
        key: &str,
        obj: &O,
    ) -> Result<()> {
        let timer = OperationTimer::new("update");
        let result = self.do_update(key, obj).await;
        timer.observe(&result);
        result
    }

    async fn delete(
        &self,
        key: &str,
    ) -> Result<()> {
        let timer = OperationTimer::new("delete");
        let result = self.do_delete(key).await;
        timer.observe(&result);
        result
    }

    async fn watch<O: Object>(
        &self,
        key: &str,
        ref_obj: &O,
    ) -> Result<WatchHandle<O>> {
        let timer = OperationTimer::new("watch");
        let result = self.do_watch(key, ref_obj).await;
        timer.observe(&result);
        result
    }
}

#[cfg(feature = "etcd")]
impl Store<crate::EtcdCoordinator> {
    /// Connects to the endpoints in `config.coordinator` and roots the store at `prefix`
    pub async fn connect(
        prefix: &str,
        config: StoreConfig,
    ) -> Result<Self> {
        let coordinator = crate::EtcdCoordinator::connect(&config.coordinator).await?;
        Ok(Self::with_config(Arc::new(coordinator), prefix, config))
    }
}
