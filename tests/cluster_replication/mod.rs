use std::time::Duration;

use dstore::cluster_layout;
use tempfile::tempdir;

use crate::common::enable_logger;
use crate::common::member_name;
use crate::common::start_cluster;

#[tokio::test]
async fn test_replicas_converge_after_member_recovers() {
    enable_logger();
    let dir = tempdir().unwrap();
    let cluster = start_cluster(3, 3, dir.path());

    let sm0 = cluster.nodes[0].storage_manager("graph");
    let mut locs = Vec::new();
    for i in 0..6u8 {
        locs.push(sm0.insert(vec![i; 4]).await.unwrap());
    }

    cluster.faults.mark_unreachable(&member_name(2));
    for loc in &locs {
        sm0.update(*loc, b"updated".to_vec()).await.unwrap();
    }
    sm0.free(locs[0]).await.unwrap();

    // Member 2 misses every write while cut off
    let sm2 = cluster.nodes[2].storage_manager("graph");
    assert_eq!(sm2.fetch(locs[1]).await.unwrap(), vec![1u8; 4]);

    cluster.faults.restore(&member_name(2));
    let handles: Vec<_> = cluster.nodes.iter().map(|n| n.start_housekeeping()).collect();

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let pending: usize = cluster
                .nodes
                .iter()
                .map(|n| n.transfer_log().len().unwrap())
                .sum();
            if pending == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("transfer logs drained");

    for handle in handles {
        handle.stop().await.unwrap();
    }

    for node in &cluster.nodes {
        let sm = node.storage_manager("graph");
        assert!(sm.fetch(locs[0]).await.unwrap_err().is_slot_not_found());
        for loc in &locs[1..] {
            assert_eq!(sm.fetch(*loc).await.unwrap(), b"updated");
            assert_eq!(sm.version(*loc).unwrap(), 2);
        }
    }

    let layout = cluster_layout(&cluster.nodes, "graph");
    assert!(!layout.contains("transfer:"));
}

#[tokio::test]
async fn test_every_member_serves_reads() {
    let dir = tempdir().unwrap();
    let cluster = start_cluster(3, 1, dir.path());

    let mut written = Vec::new();
    for (i, node) in cluster.nodes.iter().enumerate() {
        let sm = node.storage_manager("graph");
        let value = format!("from {}", i).into_bytes();
        written.push((sm.insert(value.clone()).await.unwrap(), value));
    }

    for node in &cluster.nodes {
        let sm = node.storage_manager("graph");
        for (loc, value) in &written {
            assert_eq!(&sm.fetch(*loc).await.unwrap(), value);
        }
    }
}
