use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::test_utils::create_cluster;
use crate::test_utils::enable_logger;
use crate::NetworkError;
use crate::ReplicationConfig;

#[tokio::test]
async fn test_join_builds_membership_once() {
    let test = create_cluster(3, 1, 5000);
    test.cluster.join(&test.nodes[0]);

    let names: Vec<String> = test.cluster.members().into_iter().map(|m| m.name).collect();
    assert_eq!(
        names,
        vec!["TestClusterMember-0", "TestClusterMember-1", "TestClusterMember-2"]
    );
}

#[tokio::test]
async fn test_reachability_follows_fault_injector() {
    let test = create_cluster(2, 1, 5000);
    assert!(test.cluster.is_reachable("TestClusterMember-1"));

    test.faults.mark_unreachable("TestClusterMember-1");
    assert!(!test.cluster.is_reachable("TestClusterMember-1"));
    let e = test
        .cluster
        .send("TestClusterMember-1", DataRequest::routed_fetch("test", 1))
        .await
        .unwrap_err();
    assert!(matches!(e, crate::Error::Network(NetworkError::Unreachable { .. })));

    test.faults.restore("TestClusterMember-1");
    assert!(test.cluster.is_reachable("TestClusterMember-1"));
}

#[tokio::test]
async fn test_send_to_unknown_member() {
    let test = create_cluster(1, 1, 5000);
    assert!(!test.cluster.is_reachable("nobody"));
    let e = test
        .cluster
        .send("nobody", DataRequest::routed_fetch("test", 1))
        .await
        .unwrap_err();
    assert!(e.is_transport_fault());
}

#[tokio::test]
async fn test_send_routed_insert_and_fetch() {
    enable_logger();
    let test = create_cluster(2, 1, 5000);

    let loc = test
        .cluster
        .send("TestClusterMember-1", DataRequest::routed_insert("test", b"remote".to_vec()))
        .await
        .unwrap();
    assert_eq!(loc, json!(2500));

    let value = test
        .cluster
        .send("TestClusterMember-1", DataRequest::routed_fetch("test", 2500))
        .await
        .unwrap();
    let value: Vec<u8> = serde_json::from_value(value).unwrap();
    assert_eq!(value, b"remote");
}

#[tokio::test]
async fn test_remote_errors_come_back_typed() {
    let test = create_cluster(2, 1, 5000);

    let e = test
        .cluster
        .send("TestClusterMember-0", DataRequest::routed_fetch("test", 3))
        .await
        .unwrap_err();
    assert!(e.is_slot_not_found());
}

#[tokio::test]
async fn test_dropped_node_is_unreachable() {
    let cluster = Arc::new(LocalCluster::new(Arc::new(NoMemberFaults)));
    let node = MemberNodeBuilder::new(Member::new("m1", "localhost:9020"), cluster.clone())
        .replication(ReplicationConfig {
            replication_factor: 1,
            distribution_range: 100,
        })
        .build()
        .unwrap();
    cluster.join(&node);
    assert!(cluster.is_reachable("m1"));

    drop(node);
    assert!(!cluster.is_reachable("m1"));
    // Still a member, only its node is gone
    assert_eq!(cluster.members().len(), 1);
}

#[tokio::test]
async fn test_leave_removes_member() {
    let test = create_cluster(3, 1, 5000);
    test.cluster.leave("TestClusterMember-1");

    let names: Vec<String> = test.cluster.members().into_iter().map(|m| m.name).collect();
    assert_eq!(names, vec!["TestClusterMember-0", "TestClusterMember-2"]);
    assert!(!test.cluster.is_reachable("TestClusterMember-1"));
}

#[test]
fn test_cluster_layout_concatenates_member_dumps() {
    let test = create_cluster(2, 1, 5000);
    let layout = test.layout("test");

    assert!(layout.starts_with("TestClusterMember-0 MemberStorageManager mgs1/ls_test\n"));
    assert!(layout.contains("TestClusterMember-1 MemberStorageManager mgs2/ls_test\n"));
}
