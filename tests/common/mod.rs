use std::path::Path;
use std::sync::Arc;

use dstore::ClusterConfig;
use dstore::HousekeepingConfig;
use dstore::LocalCluster;
use dstore::Member;
use dstore::MemberNode;
use dstore::MemberNodeBuilder;
use dstore::ReplicationConfig;
use dstore::Settings;
use dstore::TransferConfig;
use dstore::UnreachableMembers;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for integration test.");
}

pub fn member_name(index: usize) -> String {
    format!("member-{}", index)
}

pub fn members(count: usize) -> Vec<Member> {
    (0..count)
        .map(|i| Member::new(member_name(i), format!("127.0.0.1:{}", 9081 + i)))
        .collect()
}

/// Settings of member `index` in a cluster of `count` members
pub fn member_settings(
    index: usize,
    count: usize,
    replication_factor: usize,
    db_root_dir: &Path,
) -> Settings {
    let settings = Settings {
        cluster: ClusterConfig {
            member_name: member_name(index),
            storage_id: format!("mgs{}", index + 1),
            members: members(count),
            db_root_dir: db_root_dir.to_path_buf(),
            ..ClusterConfig::default()
        },
        replication: ReplicationConfig {
            replication_factor,
            distribution_range: 3000,
        },
        housekeeping: HousekeepingConfig {
            interval_ms: 50,
            enabled: true,
        },
        transfer: TransferConfig {
            persistent: true,
            log_dir: "transfer_log".into(),
        },
        ..Settings::default()
    };
    settings.validate().expect("valid test settings");
    settings
}

pub fn start_member(
    settings: &Settings,
    cluster: &Arc<LocalCluster>,
) -> Arc<MemberNode> {
    let node = MemberNodeBuilder::from_settings(settings, cluster.clone())
        .expect("member settings")
        .build()
        .expect("member node");
    cluster.join(&node);
    node
}

pub struct Cluster {
    pub cluster: Arc<LocalCluster>,
    pub faults: Arc<UnreachableMembers>,
    pub nodes: Vec<Arc<MemberNode>>,
}

pub fn start_cluster(
    count: usize,
    replication_factor: usize,
    db_root_dir: &Path,
) -> Cluster {
    let faults = Arc::new(UnreachableMembers::default());
    let cluster = Arc::new(LocalCluster::with_members(members(count), faults.clone()));
    let nodes = (0..count)
        .map(|i| start_member(&member_settings(i, count, replication_factor, db_root_dir), &cluster))
        .collect();
    Cluster {
        cluster,
        faults,
        nodes,
    }
}
