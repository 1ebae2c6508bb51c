use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use super::distribution::ordered_members;
use super::member_node::StoreState;
use super::DataRequest;
use super::MemberNode;
use crate::BackoffPolicy;
use crate::Error;
use crate::Location;
use crate::NetworkError;
use crate::Result;
use crate::StorageError;

/// Client handle of one replicated store on one member.
///
/// Writes are applied on this member when it holds a replica, then
/// forwarded to the other replicas. Replicas that cannot be reached in
/// time get a transfer entry, the caller only sees the local outcome.
#[derive(Clone)]
pub struct MemberStorageManager {
    node: Arc<MemberNode>,
    store: Arc<StoreState>,
}

impl std::fmt::Debug for MemberStorageManager {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MemberStorageManager")
            .field("member", &self.node.name())
            .field("store", &self.store.name)
            .finish()
    }
}

impl MemberStorageManager {
    pub(crate) fn new(
        node: Arc<MemberNode>,
        store: Arc<StoreState>,
    ) -> Self {
        Self { node, store }
    }

    pub fn name(&self) -> &str {
        &self.store.name
    }

    pub fn member(&self) -> &str {
        self.node.name()
    }

    /// Stores `value` under a new cluster location.
    ///
    /// The primary is picked round-robin over the ordered membership,
    /// skipping unreachable members. A remote primary allocates the
    /// location from its own slice.
    pub async fn insert(
        &self,
        value: Vec<u8>,
    ) -> Result<Location> {
        let members = ordered_members(&self.node.cluster.members());
        let start = {
            let mut inner = self.store.inner.lock();
            let start = inner.round_robin;
            inner.round_robin = inner.round_robin.wrapping_add(1);
            start
        };

        let mut last_error = None;
        for offset in 0..members.len() {
            let candidate = &members[(start + offset) % members.len()];
            if candidate.name == self.node.name() {
                return self.node.insert_local(&self.store, value).await;
            }
            if !self.node.cluster.is_reachable(&candidate.name) {
                debug!("skip unreachable insert candidate {}", candidate.name);
                continue;
            }

            // Inserts are not idempotent: one attempt, and only a request
            // that never reached the candidate moves on to the next one
            let policy = BackoffPolicy {
                max_retries: 1,
                ..self.node.retry.routing
            };
            let request = DataRequest::routed_insert(&self.store.name, value.clone());
            match self.node.send_to(&candidate.name, request, policy).await {
                Ok(result) => {
                    return Ok(serde_json::from_value(result).map_err(NetworkError::Protocol)?);
                }
                Err(e) if is_undelivered(&e) => {
                    warn!("routed insert to {} failed: {:?}", candidate.name, e);
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!("routed insert to {} has unknown outcome: {:?}", candidate.name, e);
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            NetworkError::NoReachableReplica {
                store: self.store.name.clone(),
                location: 0,
            }
            .into()
        }))
    }

    pub async fn insert_object<T: Serialize>(
        &self,
        object: &T,
    ) -> Result<Location> {
        let bytes = bincode::serialize(object).map_err(StorageError::Bincode)?;
        self.insert(bytes).await
    }

    pub async fn update(
        &self,
        loc: Location,
        value: Vec<u8>,
    ) -> Result<()> {
        if self.node.holds(&self.store.name, loc) {
            return self.node.update_local(&self.store, loc, value).await;
        }
        self.route(DataRequest::routed_update(&self.store.name, loc, value))
            .await
            .map(|_| ())
    }

    pub async fn update_object<T: Serialize>(
        &self,
        loc: Location,
        object: &T,
    ) -> Result<()> {
        let bytes = bincode::serialize(object).map_err(StorageError::Bincode)?;
        self.update(loc, bytes).await
    }

    pub async fn free(
        &self,
        loc: Location,
    ) -> Result<()> {
        if self.node.holds(&self.store.name, loc) {
            return self.node.free_local(&self.store, loc).await;
        }
        self.route(DataRequest::routed_free(&self.store.name, loc))
            .await
            .map(|_| ())
    }

    /// Reads are local on a replica and routed to the first reachable
    /// replica otherwise.
    pub async fn fetch(
        &self,
        loc: Location,
    ) -> Result<Vec<u8>> {
        if self.node.holds(&self.store.name, loc) {
            return self.node.fetch_local(&self.store, loc);
        }
        let result = self
            .route(DataRequest::routed_fetch(&self.store.name, loc))
            .await?;
        Ok(serde_json::from_value(result).map_err(NetworkError::Protocol)?)
    }

    pub async fn fetch_object<T: DeserializeOwned>(
        &self,
        loc: Location,
    ) -> Result<T> {
        let bytes = self.fetch(loc).await?;
        Ok(bincode::deserialize(&bytes).map_err(StorageError::Bincode)?)
    }

    /// Cache-only read. Never leaves this member: a location held elsewhere
    /// reports `NotInCache`.
    pub fn fetch_cached(
        &self,
        loc: Location,
    ) -> Result<Option<Vec<u8>>> {
        if !self.node.holds(&self.store.name, loc) {
            return Err(StorageError::NotInCache {
                store: self.store.name.clone(),
                location: loc,
            }
            .into());
        }
        self.node.fetch_cached_local(&self.store, loc)
    }

    /// Cluster version of `loc` as known by this member
    pub fn version(
        &self,
        loc: Location,
    ) -> Result<u64> {
        self.store
            .translation(loc)
            .map(|t| t.version)
            .ok_or_else(|| {
                StorageError::SlotNotFound {
                    store: self.store.name.clone(),
                    location: loc,
                }
                .into()
            })
    }

    pub async fn set_root(
        &self,
        index: usize,
        loc: Location,
    ) -> Result<()> {
        self.node.set_root_local(&self.store, index, loc).await
    }

    pub fn root(
        &self,
        index: usize,
    ) -> Result<Location> {
        self.store.storage.root(index)
    }

    /// Flushes the local store and the transfer log
    pub fn flush(&self) -> Result<()> {
        self.store.storage.flush()?;
        self.node.transfer_log.flush()
    }

    pub fn rollback(&self) -> Result<()> {
        self.store.storage.rollback()
    }

    pub fn close(&self) -> Result<()> {
        self.store.storage.close()
    }

    pub fn layout(&self) -> String {
        self.node.layout(&self.store.name)
    }

    async fn route(
        &self,
        request: DataRequest,
    ) -> Result<Value> {
        let loc = request.args.loc.unwrap_or_default();
        for replica in self.node.replicas(&self.store.name, loc) {
            if !self.node.cluster.is_reachable(&replica.name) {
                continue;
            }
            match self
                .node
                .send_to(&replica.name, request.clone(), self.node.retry.routing)
                .await
            {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transport_fault() || is_not_responsible(&e) => {
                    warn!("routing {} to {} failed: {:?}", request.request_type, replica.name, e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(NetworkError::NoReachableReplica {
            store: self.store.name.clone(),
            location: loc,
        }
        .into())
    }
}

/// The request was refused before reaching the target
fn is_undelivered(e: &Error) -> bool {
    matches!(
        e,
        Error::Network(NetworkError::Unreachable { .. } | NetworkError::UnknownMember(_))
    )
}

fn is_not_responsible(e: &Error) -> bool {
    matches!(e, Error::Network(NetworkError::NotResponsible { .. }))
}
