//! Builder for [`MemberNode`].
//!
//! Defaults: in-memory local stores, in-memory transfer log, default
//! replication, retry and housekeeping settings. Override any of them
//! before calling [`MemberNodeBuilder::build`].
//!
//! ## Example
//! ```ignore
//! let cluster = Arc::new(LocalCluster::new(Arc::new(NoMemberFaults)));
//! let node = MemberNodeBuilder::from_settings(&settings, cluster.clone())?
//!     .build()?;
//! cluster.join(&node);
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use tracing::info;

use super::DistributionTable;
use super::Member;
use super::MemberNode;
use super::StorageFactory;
use crate::ClusterManager;
use crate::Error;
use crate::HousekeepingConfig;
use crate::MemTransferLog;
use crate::MemoryStorageManager;
use crate::ReplicationConfig;
use crate::Result;
use crate::RetryPolicies;
use crate::Settings;
use crate::SledTransferLog;
use crate::StorageManager;
use crate::TransferLog;
use crate::TransferWorker;

pub struct MemberNodeBuilder {
    member: Member,
    storage_id: String,
    cluster: Arc<dyn ClusterManager>,
    replication: ReplicationConfig,
    retry: RetryPolicies,
    housekeeping: HousekeepingConfig,
    transfer_log: Option<Arc<dyn TransferLog>>,
    storage_factory: Option<StorageFactory>,
}

impl MemberNodeBuilder {
    pub fn new(
        member: Member,
        cluster: Arc<dyn ClusterManager>,
    ) -> Self {
        Self {
            member,
            storage_id: "mgs1".to_string(),
            cluster,
            replication: ReplicationConfig::default(),
            retry: RetryPolicies::default(),
            housekeeping: HousekeepingConfig::default(),
            transfer_log: None,
            storage_factory: None,
        }
    }

    /// Builder for the member named by `settings.cluster.member_name`.
    /// Opens the sled transfer log when `transfer.persistent` is set.
    pub fn from_settings(
        settings: &Settings,
        cluster: Arc<dyn ClusterManager>,
    ) -> Result<Self> {
        let member = settings
            .cluster
            .members
            .iter()
            .find(|m| m.name == settings.cluster.member_name)
            .cloned()
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "Current member {} not found in members",
                    settings.cluster.member_name
                ))
            })?;

        let mut builder = Self::new(member, cluster)
            .storage_id(&settings.cluster.storage_id)
            .replication(settings.replication.clone())
            .retry(settings.retry.clone())
            .housekeeping(settings.housekeeping.clone());

        if settings.transfer.persistent {
            let path = settings
                .cluster
                .db_root_dir
                .join(&settings.transfer.log_dir)
                .join(&settings.cluster.member_name);
            info!("open durable transfer log at {:?}", path);
            builder = builder.transfer_log(Arc::new(SledTransferLog::open(path)?));
        }
        Ok(builder)
    }

    pub fn storage_id(
        mut self,
        storage_id: &str,
    ) -> Self {
        self.storage_id = storage_id.to_string();
        self
    }

    pub fn replication(
        mut self,
        replication: ReplicationConfig,
    ) -> Self {
        self.replication = replication;
        self
    }

    pub fn retry(
        mut self,
        retry: RetryPolicies,
    ) -> Self {
        self.retry = retry;
        self
    }

    pub fn housekeeping(
        mut self,
        housekeeping: HousekeepingConfig,
    ) -> Self {
        self.housekeeping = housekeeping;
        self
    }

    pub fn transfer_log(
        mut self,
        transfer_log: Arc<dyn TransferLog>,
    ) -> Self {
        self.transfer_log = Some(transfer_log);
        self
    }

    /// Factory for local stores, e.g. to inject access faults
    pub fn storage_factory(
        mut self,
        storage_factory: StorageFactory,
    ) -> Self {
        self.storage_factory = Some(storage_factory);
        self
    }

    pub fn build(self) -> Result<Arc<MemberNode>> {
        let distribution = DistributionTable::new(&self.replication)?;
        let transfer_log: Arc<dyn TransferLog> = match self.transfer_log {
            Some(transfer_log) => transfer_log,
            None => Arc::new(MemTransferLog::new()),
        };
        let storage_factory: StorageFactory = match self.storage_factory {
            Some(factory) => factory,
            None => Arc::new(|name: &str| {
                Arc::new(MemoryStorageManager::new(name)) as Arc<dyn StorageManager>
            }),
        };
        let transfer_worker = TransferWorker::new(self.member.name.clone(), self.retry.transfer);

        debug!(
            "build member {} (rf={}, range={})",
            self.member.name,
            distribution.replication_factor(),
            distribution.distribution_range()
        );

        Ok(Arc::new(MemberNode {
            member: self.member,
            storage_id: self.storage_id,
            cluster: self.cluster,
            distribution,
            retry: self.retry,
            housekeeping_config: self.housekeeping,
            stores: DashMap::new(),
            storage_factory,
            transfer_log,
            transfer_worker,
            acked: DashMap::new(),
            acked_roots: DashMap::new(),
            touched: Mutex::new(Default::default()),
            touched_roots: Mutex::new(Default::default()),
        }))
    }
}
