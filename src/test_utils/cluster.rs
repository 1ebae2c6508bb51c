use std::sync::Arc;

use crate::cluster_layout;
use crate::LocalCluster;
use crate::Member;
use crate::MemberNode;
use crate::MemberNodeBuilder;
use crate::ReplicationConfig;
use crate::UnreachableMembers;

/// Members named `TestClusterMember-<i>` with storage ids `mgs<i+1>`,
/// joined to one in-process cluster.
pub struct TestCluster {
    pub cluster: Arc<LocalCluster>,
    pub nodes: Vec<Arc<MemberNode>>,
    pub faults: Arc<UnreachableMembers>,
}

impl TestCluster {
    pub fn layout(
        &self,
        store: &str,
    ) -> String {
        cluster_layout(&self.nodes, store)
    }

    pub fn member_name(index: usize) -> String {
        format!("TestClusterMember-{}", index)
    }
}

pub fn create_cluster(
    members: usize,
    replication_factor: usize,
    distribution_range: u64,
) -> TestCluster {
    let faults = Arc::new(UnreachableMembers::default());
    let cluster = Arc::new(LocalCluster::new(faults.clone()));

    let nodes = (0..members)
        .map(|i| {
            let member = Member::new(TestCluster::member_name(i), format!("localhost:{}", 9020 + i));
            let node = MemberNodeBuilder::new(member, cluster.clone())
                .storage_id(&format!("mgs{}", i + 1))
                .replication(ReplicationConfig {
                    replication_factor,
                    distribution_range,
                })
                .build()
                .unwrap();
            cluster.join(&node);
            node
        })
        .collect();

    TestCluster {
        cluster,
        nodes,
        faults,
    }
}
