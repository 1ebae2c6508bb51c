use tempfile::tempdir;

use crate::common::member_name;
use crate::common::member_settings;
use crate::common::start_cluster;
use crate::common::start_member;

#[tokio::test]
async fn test_pending_transfers_survive_member_restart() {
    let dir = tempdir().unwrap();
    let mut cluster = start_cluster(2, 2, dir.path());

    cluster.faults.mark_unreachable(&member_name(1));
    let loc = cluster.nodes[0]
        .storage_manager("graph")
        .insert(b"durable".to_vec())
        .await
        .unwrap();
    cluster.nodes[0].transfer_log().flush().unwrap();
    assert_eq!(cluster.nodes[0].transfer_log().len().unwrap(), 1);

    // Restart member 0 on the same transfer log directory
    drop(cluster.nodes.remove(0));
    let restarted = start_member(&member_settings(0, 2, 2, dir.path()), &cluster.cluster);
    let pending = restarted.transfer_log().entries().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].1.target, member_name(1));

    cluster.faults.restore(&member_name(1));
    let report = restarted.housekeeping().await.unwrap();
    assert_eq!(report.transfer.applied.len(), 1);
    assert!(restarted.transfer_log().is_empty().unwrap());

    let sm1 = cluster.nodes[0].storage_manager("graph");
    assert_eq!(sm1.fetch(loc).await.unwrap(), b"durable");
}
