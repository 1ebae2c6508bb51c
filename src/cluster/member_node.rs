//! One member of the cluster.
//!
//! A [`MemberNode`] hosts every store of its member. For each store it keeps
//! the local [`StorageManager`] and the translation from cluster locations
//! to local locations together with the cluster version of each record.
//! Client handles ([`MemberStorageManager`]) and requests arriving from
//! other members both end up here.
//!
//! Bookkeeping for repair:
//! - `acked`: last version each replica confirmed for a location
//! - `touched`: locations and roots this member wrote itself; the
//!   housekeeping sweep compares them against `acked`

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::DataRequest;
use super::DistributionTable;
use super::Member;
use super::MemberStorageManager;
use super::RequestType;
use crate::constants::LOCAL_STORE_PREFIX;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::BackoffPolicy;
use crate::ClusterManager;
use crate::HousekeepingConfig;
use crate::Location;
use crate::NetworkError;
use crate::Result;
use crate::RetryPolicies;
use crate::StorageError;
use crate::StorageManager;
use crate::TransferEntry;
use crate::TransferLog;
use crate::TransferWorker;
use crate::FORWARD_FAILURES;
use crate::ROOT_COUNT;
use crate::TRANSFER_LOG_PENDING;

/// Creates the local storage manager of a store from its local name
pub type StorageFactory = Arc<dyn Fn(&str) -> Arc<dyn StorageManager> + Send + Sync>;

/// Where a cluster location lives on this member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Translation {
    pub(crate) local: Location,
    pub(crate) version: u64,
}

pub(crate) struct StoreState {
    pub(crate) name: String,
    pub(crate) storage: Arc<dyn StorageManager>,
    pub(crate) inner: Mutex<StoreInner>,
}

#[derive(Default)]
pub(crate) struct StoreInner {
    pub(crate) translation: BTreeMap<Location, Translation>,
    /// Next cluster location to try when this member allocates as primary
    pub(crate) next_cloc: Location,
    /// Insert routing cursor over the ordered membership
    pub(crate) round_robin: usize,
}

impl StoreState {
    fn new(
        name: &str,
        storage: Arc<dyn StorageManager>,
    ) -> Self {
        Self {
            name: name.to_string(),
            storage,
            inner: Mutex::new(StoreInner::default()),
        }
    }

    pub(crate) fn translation(
        &self,
        loc: Location,
    ) -> Option<Translation> {
        self.inner.lock().translation.get(&loc).copied()
    }

    fn slot_not_found(
        &self,
        loc: Location,
    ) -> StorageError {
        StorageError::SlotNotFound {
            store: self.name.clone(),
            location: loc,
        }
    }
}

/// (target member, store, cluster location)
pub(crate) type ReplicaKey = (String, String, Location);
/// (target member, store, root index)
pub(crate) type RootKey = (String, String, usize);

pub struct MemberNode {
    pub(crate) member: Member,
    pub(crate) storage_id: String,
    pub(crate) cluster: Arc<dyn ClusterManager>,
    pub(crate) distribution: DistributionTable,
    pub(crate) retry: RetryPolicies,
    pub(crate) housekeeping_config: HousekeepingConfig,
    pub(crate) stores: DashMap<String, Arc<StoreState>>,
    pub(crate) storage_factory: StorageFactory,
    pub(crate) transfer_log: Arc<dyn TransferLog>,
    pub(crate) transfer_worker: TransferWorker,
    pub(crate) acked: DashMap<ReplicaKey, u64>,
    pub(crate) acked_roots: DashMap<RootKey, Location>,
    pub(crate) touched: Mutex<BTreeSet<(String, Location)>>,
    pub(crate) touched_roots: Mutex<BTreeSet<(String, usize)>>,
}

impl std::fmt::Debug for MemberNode {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MemberNode")
            .field("member", &self.member)
            .field("storage_id", &self.storage_id)
            .field("stores", &self.stores.len())
            .finish()
    }
}

impl MemberNode {
    pub fn name(&self) -> &str {
        &self.member.name
    }

    pub fn member(&self) -> &Member {
        &self.member
    }

    pub fn storage_id(&self) -> &str {
        &self.storage_id
    }

    pub fn transfer_log(&self) -> &Arc<dyn TransferLog> {
        &self.transfer_log
    }

    /// Client handle of `store`. The store is created on first use.
    pub fn storage_manager(
        self: &Arc<Self>,
        store: &str,
    ) -> MemberStorageManager {
        MemberStorageManager::new(self.clone(), self.store(store))
    }

    pub(crate) fn store(
        &self,
        name: &str,
    ) -> Arc<StoreState> {
        if let Some(store) = self.stores.get(name) {
            return store.value().clone();
        }
        self.stores
            .entry(name.to_string())
            .or_insert_with(|| {
                let local_name = format!("{}{}", LOCAL_STORE_PREFIX, name);
                debug!("[{}] open local store {}", self.member.name, local_name);
                Arc::new(StoreState::new(name, (self.storage_factory)(&local_name)))
            })
            .value()
            .clone()
    }

    /// Replica set of `loc` under the current membership, primary first
    pub(crate) fn replicas(
        &self,
        store: &str,
        loc: Location,
    ) -> Vec<Member> {
        self.distribution.members_for(&self.cluster.members(), store, loc)
    }

    pub(crate) fn holds(
        &self,
        store: &str,
        loc: Location,
    ) -> bool {
        self.distribution
            .is_replica(&self.cluster.members(), store, loc, &self.member.name)
    }

    fn others(
        &self,
        members: Vec<Member>,
    ) -> Vec<Member> {
        members
            .into_iter()
            .filter(|m| m.name != self.member.name)
            .collect()
    }

    //---
    // Requests from other members

    /// Entry point for requests sent by other members.
    ///
    /// Transfer requests are applied locally and never forwarded. Routed
    /// requests are handled as if issued by a client of this member.
    pub async fn handle_request(
        &self,
        request: DataRequest,
    ) -> Result<Value> {
        trace!(
            "[{}] handle {} {} transfer={}",
            self.member.name,
            request.request_type,
            request.args_doc(),
            request.transfer
        );
        if request.transfer {
            self.apply_transfer(request)
        } else {
            self.apply_routed(request).await
        }
    }

    /// Idempotent: writes not newer than the local version are dropped,
    /// unknown locations are created, freeing an unknown location does
    /// nothing.
    fn apply_transfer(
        &self,
        request: DataRequest,
    ) -> Result<Value> {
        let store = self.store(request.store_name());
        match request.request_type {
            RequestType::Insert | RequestType::Update => {
                let loc = request.require_loc()?;
                let version = request.args.version.unwrap_or(1);
                let value = request.value.unwrap_or_default();

                let mut inner = store.inner.lock();
                match inner.translation.get(&loc).copied() {
                    Some(current) if current.version >= version => {
                        debug!(
                            "[{}] drop stale write {}/{} v{} (local v{})",
                            self.member.name, store.name, loc, version, current.version
                        );
                    }
                    Some(current) => {
                        store.storage.update(current.local, value)?;
                        inner.translation.insert(
                            loc,
                            Translation {
                                local: current.local,
                                version,
                            },
                        );
                    }
                    None => {
                        let local = store.storage.insert(value)?;
                        inner.translation.insert(loc, Translation { local, version });
                    }
                }
                drop(inner);
                self.touched.lock().remove(&(store.name.clone(), loc));
                Ok(Value::Null)
            }
            RequestType::Free => {
                let loc = request.require_loc()?;
                let mut inner = store.inner.lock();
                if let Some(current) = inner.translation.get(&loc).copied() {
                    store.storage.free(current.local)?;
                    inner.translation.remove(&loc);
                }
                drop(inner);
                self.touched.lock().remove(&(store.name.clone(), loc));
                Ok(Value::Null)
            }
            RequestType::SetRoot => {
                let index = request.require_root_index()?;
                let loc = request.require_loc()?;
                store.storage.set_root(index, loc)?;
                self.touched_roots.lock().remove(&(store.name.clone(), index));
                Ok(Value::Null)
            }
            RequestType::Fetch => {
                let loc = request.require_loc()?;
                let data = self.fetch_local(&store, loc)?;
                Ok(serde_json::to_value(data).map_err(NetworkError::Protocol)?)
            }
        }
    }

    async fn apply_routed(
        &self,
        request: DataRequest,
    ) -> Result<Value> {
        let store = self.store(request.store_name());
        match request.request_type {
            RequestType::Insert => {
                let loc = self
                    .insert_local(&store, request.value.unwrap_or_default())
                    .await?;
                Ok(Value::from(loc))
            }
            RequestType::Update => {
                let loc = request.require_loc()?;
                self.ensure_holds(&store, loc)?;
                self.update_local(&store, loc, request.value.unwrap_or_default())
                    .await?;
                Ok(Value::Null)
            }
            RequestType::Free => {
                let loc = request.require_loc()?;
                self.ensure_holds(&store, loc)?;
                self.free_local(&store, loc).await?;
                Ok(Value::Null)
            }
            RequestType::Fetch => {
                let loc = request.require_loc()?;
                self.ensure_holds(&store, loc)?;
                let data = self.fetch_local(&store, loc)?;
                Ok(serde_json::to_value(data).map_err(NetworkError::Protocol)?)
            }
            RequestType::SetRoot => {
                let index = request.require_root_index()?;
                let loc = request.require_loc()?;
                self.set_root_local(&store, index, loc).await?;
                Ok(Value::Null)
            }
        }
    }

    /// Routed requests are never routed again
    fn ensure_holds(
        &self,
        store: &StoreState,
        loc: Location,
    ) -> Result<()> {
        if self.holds(&store.name, loc) {
            return Ok(());
        }
        Err(NetworkError::NotResponsible {
            member: self.member.name.clone(),
            store: store.name.clone(),
            location: loc,
        }
        .into())
    }

    //---
    // Local application followed by replication

    /// Allocates the next cluster location of this member's slice, stores
    /// the value and replicates it.
    pub(crate) async fn insert_local(
        &self,
        store: &StoreState,
        value: Vec<u8>,
    ) -> Result<Location> {
        let members = self.cluster.members();
        let range = self
            .distribution
            .location_range(&members, &self.member.name)
            .ok_or_else(|| NetworkError::UnknownMember(self.member.name.clone()))?;

        let loc = {
            let mut inner = store.inner.lock();
            let mut loc = if range.contains(&inner.next_cloc) {
                inner.next_cloc
            } else {
                range.start
            };
            while loc < range.end && inner.translation.contains_key(&loc) {
                loc += 1;
            }
            if loc >= range.end {
                return Err(StorageError::LocationRangeExhausted {
                    store: store.name.clone(),
                    start: range.start,
                    end: range.end,
                }
                .into());
            }

            let local = store.storage.insert(value.clone())?;
            inner.translation.insert(loc, Translation { local, version: 1 });
            inner.next_cloc = loc + 1;
            loc
        };
        debug!("[{}] insert {}/{} as primary", self.member.name, store.name, loc);

        self.touch(&store.name, loc);
        let targets = self.others(self.distribution.members_for(&members, &store.name, loc));
        self.replicate(DataRequest::transfer_insert(&store.name, loc, 1, value), targets)
            .await;
        Ok(loc)
    }

    pub(crate) async fn update_local(
        &self,
        store: &StoreState,
        loc: Location,
        value: Vec<u8>,
    ) -> Result<()> {
        let version = {
            let mut inner = store.inner.lock();
            let current = inner
                .translation
                .get(&loc)
                .copied()
                .ok_or_else(|| store.slot_not_found(loc))?;
            store.storage.update(current.local, value.clone())?;
            let version = current.version + 1;
            inner.translation.insert(
                loc,
                Translation {
                    local: current.local,
                    version,
                },
            );
            version
        };

        self.touch(&store.name, loc);
        let targets = self.others(self.replicas(&store.name, loc));
        self.replicate(DataRequest::transfer_update(&store.name, loc, version, value), targets)
            .await;
        Ok(())
    }

    pub(crate) async fn free_local(
        &self,
        store: &StoreState,
        loc: Location,
    ) -> Result<()> {
        {
            let mut inner = store.inner.lock();
            let current = inner
                .translation
                .get(&loc)
                .copied()
                .ok_or_else(|| store.slot_not_found(loc))?;
            store.storage.free(current.local)?;
            inner.translation.remove(&loc);
        }

        self.touch(&store.name, loc);
        let targets = self.others(self.replicas(&store.name, loc));
        self.replicate(DataRequest::transfer_free(&store.name, loc), targets)
            .await;
        Ok(())
    }

    pub(crate) fn fetch_local(
        &self,
        store: &StoreState,
        loc: Location,
    ) -> Result<Vec<u8>> {
        let current = store
            .translation(loc)
            .ok_or_else(|| store.slot_not_found(loc))?;
        store.storage.fetch(current.local)
    }

    pub(crate) fn fetch_cached_local(
        &self,
        store: &StoreState,
        loc: Location,
    ) -> Result<Option<Vec<u8>>> {
        match store.translation(loc) {
            Some(current) => store.storage.fetch_cached(current.local),
            None => Ok(None),
        }
    }

    /// Roots are replicated to every member of the cluster
    pub(crate) async fn set_root_local(
        &self,
        store: &StoreState,
        index: usize,
        loc: Location,
    ) -> Result<()> {
        store.storage.set_root(index, loc)?;

        self.touched_roots.lock().insert((store.name.clone(), index));
        let targets = self.others(self.cluster.members());
        self.replicate(DataRequest::transfer_set_root(&store.name, index, loc), targets)
            .await;
        Ok(())
    }

    fn touch(
        &self,
        store: &str,
        loc: Location,
    ) {
        self.touched.lock().insert((store.to_string(), loc));
    }

    //---
    // Forwarding

    /// Forwards `request` to every target concurrently. Targets that fail
    /// get a transfer entry instead; nothing is reported to the caller.
    ///
    /// A target with pending transfers gets the request queued behind them,
    /// so each target applies writes in the order they were made.
    pub(crate) async fn replicate(
        &self,
        request: DataRequest,
        targets: Vec<Member>,
    ) {
        let (queued, direct): (Vec<Member>, Vec<Member>) = targets
            .into_iter()
            .partition(|target| self.has_backlog(&target.name));
        for target in &queued {
            debug!(
                "[{}] {} has pending transfers, queue {} {} behind them",
                self.member.name,
                target.name,
                request.request_type,
                request.args_doc()
            );
            self.enqueue(&target.name, request.clone());
        }
        if direct.is_empty() {
            return;
        }

        let sends = direct.iter().map(|target| {
            let request = request.clone();
            async move {
                let result = self.send_to(&target.name, request, self.retry.forward).await;
                (target, result)
            }
        });

        for (target, result) in join_all(sends).await {
            match result {
                Ok(_) => self.record_ack(&target.name, &request),
                Err(e) => {
                    warn!(
                        "[{}] forward {} {} to {} failed, queue transfer: {:?}",
                        self.member.name,
                        request.request_type,
                        request.args_doc(),
                        target.name,
                        e
                    );
                    FORWARD_FAILURES
                        .with_label_values(&[&self.member.name, &target.name])
                        .inc();
                    self.enqueue(&target.name, request.clone());
                }
            }
        }
    }

    fn has_backlog(
        &self,
        target: &str,
    ) -> bool {
        match self.transfer_log.entries_for(target) {
            Ok(entries) => !entries.is_empty(),
            Err(e) => {
                warn!("[{}] can not read transfer log for {}: {:?}", self.member.name, target, e);
                true
            }
        }
    }

    pub(crate) async fn send_to(
        &self,
        target: &str,
        request: DataRequest,
        policy: BackoffPolicy,
    ) -> Result<Value> {
        if !self.cluster.is_reachable(target) {
            return Err(NetworkError::Unreachable {
                member: target.to_string(),
            }
            .into());
        }
        task_with_timeout_and_exponential_backoff(|| self.cluster.send(target, request.clone()), policy)
            .await
    }

    /// Remembers what `target` confirmed to hold
    pub(crate) fn record_ack(
        &self,
        target: &str,
        request: &DataRequest,
    ) {
        let store = request.args.store_name.clone();
        match request.request_type {
            RequestType::Insert | RequestType::Update => {
                if let (Some(loc), Some(version)) = (request.args.loc, request.args.version) {
                    let mut acked = self.acked.entry((target.to_string(), store, loc)).or_insert(0);
                    *acked = (*acked).max(version);
                }
            }
            RequestType::Free => {
                if let Some(loc) = request.args.loc {
                    self.acked.remove(&(target.to_string(), store, loc));
                }
            }
            RequestType::SetRoot => {
                if let (Some(index), Some(loc)) = (request.args.root_index, request.args.loc) {
                    self.acked_roots.insert((target.to_string(), store, index), loc);
                }
            }
            RequestType::Fetch => {}
        }
    }

    /// Queues `request` for `target`. A pending Update of the same location
    /// is superseded by a newer one.
    pub(crate) fn enqueue(
        &self,
        target: &str,
        request: DataRequest,
    ) {
        if let Err(e) = self.try_enqueue(target, request) {
            error!("[{}] failed to queue transfer for {}: {:?}", self.member.name, target, e);
        }
    }

    fn try_enqueue(
        &self,
        target: &str,
        request: DataRequest,
    ) -> Result<()> {
        if request.request_type == RequestType::Update {
            for (seq, entry) in self.transfer_log.entries_for(target)? {
                if entry.request.request_type == RequestType::Update
                    && entry.request.args.store_name == request.args.store_name
                    && entry.request.args.loc == request.args.loc
                {
                    trace!("[{}] supersede transfer #{}", self.member.name, seq);
                    self.transfer_log.remove(seq)?;
                }
            }
        }
        self.transfer_log.append(TransferEntry::new(target, request))?;
        TRANSFER_LOG_PENDING
            .with_label_values(&[&self.member.name])
            .set(self.transfer_log.len()? as i64);
        Ok(())
    }

    //---
    // Diagnostics

    /// Deterministic dump of one store: roots, records ordered by local
    /// location and the pending transfers touching the store.
    pub fn layout(
        &self,
        store_name: &str,
    ) -> String {
        let store = self.store(store_name);
        let mut out = format!(
            "{} MemberStorageManager {}/{}\n",
            self.member.name,
            self.storage_id,
            store.storage.name()
        );

        out.push_str("Roots: ");
        for index in 0..ROOT_COUNT {
            let root = store.storage.root(index).unwrap_or_default();
            out.push_str(&format!("{}={} ", index, root));
        }
        out.push('\n');

        let mut records: Vec<(Location, Translation)> = store
            .inner
            .lock()
            .translation
            .iter()
            .map(|(cloc, t)| (*cloc, *t))
            .collect();
        records.sort_by_key(|(_, t)| t.local);
        for (cloc, t) in records {
            let payload = store
                .storage
                .fetch_cached(t.local)
                .ok()
                .flatten()
                .unwrap_or_default();
            out.push_str(&format!(
                "cloc: {} (v:{}) - lloc: {} - {:?}\n",
                cloc,
                t.version,
                t.local,
                String::from_utf8_lossy(&payload)
            ));
        }

        match self.transfer_log.entries() {
            Ok(entries) => {
                for (_, entry) in entries {
                    if entry.request.store_name() != store_name {
                        continue;
                    }
                    out.push_str(&format!(
                        "transfer: [{}] - {} {} {:?}\n",
                        entry.target,
                        entry.request.request_type,
                        entry.request.args_doc(),
                        entry.request.value_doc()
                    ));
                }
            }
            Err(e) => out.push_str(&format!("transfer: unavailable ({})\n", e)),
        }
        out
    }
}
