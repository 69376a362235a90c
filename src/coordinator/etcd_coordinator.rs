//! etcd v3 adapter
//!
//! Maps the coordinator protocol onto `etcd-client`. Change streams are
//! opened with `prev_kv` so delete events carry the value being removed.

use std::time::Duration;

use bytes::Bytes;
use etcd_client::Client;
use etcd_client::CompareOp;
use etcd_client::ConnectOptions;
use etcd_client::EventType;
use etcd_client::GetOptions;
use etcd_client::WatchOptions;
use futures::StreamExt;
use tracing::debug;
use tracing::info;
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
use crate::CoordinatorConfig;
use crate::CoordinatorError;
use crate::CoordinatorResult;

/// Coordinator backed by an etcd cluster.
///
/// Cheap to clone; clones share the underlying gRPC channel.
#[derive(Clone)]
pub struct EtcdCoordinator {
    client: Client,
}

impl std::fmt::Debug for EtcdCoordinator {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("EtcdCoordinator").finish_non_exhaustive()
    }
}

impl EtcdCoordinator {
    pub async fn connect(config: &CoordinatorConfig) -> CoordinatorResult<Self> {
        let options = ConnectOptions::new()
            .with_connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .with_timeout(Duration::from_millis(config.request_timeout_ms));

        let client = Client::connect(&config.endpoints, Some(options)).await.map_err(|e| {
            CoordinatorError::Unavailable(format!("connect to {:?}: {e}", config.endpoints))
        })?;

        info!(endpoints = ?config.endpoints, "Connected to etcd");
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn convert_kv(kv: &etcd_client::KeyValue) -> CoordinatorResult<KeyValue> {
    let key = kv.key_str().map_err(|_| CoordinatorError::MalformedKey)?;
    Ok(KeyValue {
        key: key.to_string(),
        value: Bytes::copy_from_slice(kv.value()),
        create_revision: kv.create_revision(),
        mod_revision: kv.mod_revision(),
        version: kv.version(),
    })
}

fn convert_event(event: &etcd_client::Event) -> CoordinatorResult<Option<MutationEvent>> {
    let Some(kv) = event.kv() else {
        return Ok(None);
    };
    let kind = match event.event_type() {
        EventType::Put => MutationKind::Put,
        EventType::Delete => MutationKind::Delete,
    };
    Ok(Some(MutationEvent {
        kind,
        kv: convert_kv(kv)?,
        prev_kv: event.prev_kv().map(convert_kv).transpose()?,
    }))
}

#[async_trait::async_trait]
impl Coordinator for EtcdCoordinator {
    async fn get(
        &self,
        key: &str,
    ) -> CoordinatorResult<Option<KeyValue>> {
        let mut kv_client = self.client.kv_client();
        let response = kv_client.get(key, None).await?;
        response.kvs().first().map(convert_kv).transpose()
    }

    async fn get_prefix(
        &self,
        prefix: &str,
    ) -> CoordinatorResult<Vec<KeyValue>> {
        let mut kv_client = self.client.kv_client();
        let response = kv_client.get(prefix, Some(GetOptions::new().with_prefix())).await?;
        response.kvs().iter().map(convert_kv).collect()
    }

    async fn txn(
        &self,
        txn: Txn,
    ) -> CoordinatorResult<TxnResponse> {
        let compare = match &txn.compare {
            Compare::CreateRevision { key, revision } => {
                etcd_client::Compare::create_revision(key.as_str(), CompareOp::Equal, *revision)
            }
            Compare::ModRevision { key, revision } => {
                etcd_client::Compare::mod_revision(key.as_str(), CompareOp::Equal, *revision)
            }
        };
        let op = match txn.success {
            TxnOp::Put { key, value } => etcd_client::TxnOp::put(key, value.to_vec(), None),
            TxnOp::Delete { key } => etcd_client::TxnOp::delete(key, None),
        };

        let mut kv_client = self.client.kv_client();
        let response = kv_client
            .txn(etcd_client::Txn::new().when(vec![compare]).and_then(vec![op]))
            .await?;

        Ok(TxnResponse {
            succeeded: response.succeeded(),
            revision: response.header().map(|h| h.revision()).unwrap_or_default(),
        })
    }

    async fn watch_prefix(
        &self,
        prefix: &str,
    ) -> CoordinatorResult<ChangeStream> {
        let mut watch_client = self.client.watch_client();
        let options = WatchOptions::new().with_prefix().with_prev_key();
        let (watcher, stream) = watch_client.watch(prefix, Some(options)).await?;
        debug!(prefix, watch_id = watcher.watch_id(), "etcd watch created");

        // The watcher travels with the stream; dropping it closes the watch
        let stream = futures::stream::unfold(Some((watcher, stream)), |cursor| async move {
            let (watcher, mut stream) = cursor?;
            match stream.message().await {
                Ok(Some(response)) => {
                    if response.canceled() {
                        let reason = response.cancel_reason().to_string();
                        warn!(%reason, "etcd watch canceled");
                        return Some((Err(CoordinatorError::WatchCanceled { reason }), None));
                    }
                    let converted: CoordinatorResult<Vec<Option<MutationEvent>>> =
                        response.events().iter().map(convert_event).collect();
                    match converted {
                        Ok(events) => Some((
                            Ok(events.into_iter().flatten().collect()),
                            Some((watcher, stream)),
                        )),
                        Err(e) => Some((Err(e), None)),
                    }
                }
                Ok(None) => None,
                Err(e) => Some((Err(e.into()), None)),
            }
        });

        Ok(stream.boxed())
    }
}
