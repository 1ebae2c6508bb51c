use tempfile::tempdir;

use super::*;
use crate::DataRequest;

fn entry(
    target: &str,
    loc: u64,
) -> TransferEntry {
    TransferEntry::new(target, DataRequest::transfer_free("test", loc))
}

/// Behaviour shared by every backend
fn check_log_behaviour(log: &dyn TransferLog) {
    assert!(log.is_empty().unwrap());

    assert_eq!(log.append(entry("m2", 1)).unwrap(), 1);
    assert_eq!(log.append(entry("m1", 2)).unwrap(), 2);
    assert_eq!(log.append(entry("m2", 3)).unwrap(), 3);
    assert_eq!(log.len().unwrap(), 3);

    let seqs: Vec<TransferSeq> = log.entries().unwrap().into_iter().map(|(seq, _)| seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);

    // Ordered by each target's oldest entry
    assert_eq!(log.targets().unwrap(), vec!["m2", "m1"]);

    let for_m2 = log.entries_for("m2").unwrap();
    assert_eq!(for_m2, vec![(1, entry("m2", 1)), (3, entry("m2", 3))]);

    log.remove(1).unwrap();
    log.remove(42).unwrap();
    assert_eq!(log.len().unwrap(), 2);
    assert_eq!(log.targets().unwrap(), vec!["m1", "m2"]);

    // Sequence numbers are not reused
    assert_eq!(log.append(entry("m1", 4)).unwrap(), 4);
    log.flush().unwrap();
}

#[test]
fn test_mem_transfer_log() {
    check_log_behaviour(&MemTransferLog::new());
}

#[test]
fn test_sled_transfer_log() {
    let dir = tempdir().unwrap();
    let log = SledTransferLog::open(dir.path().join("transfer_log")).unwrap();
    check_log_behaviour(&log);
}

#[test]
fn test_sled_transfer_log_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("transfer_log");

    {
        let log = SledTransferLog::open(path.clone()).unwrap();
        log.append(entry("m1", 1)).unwrap();
        log.append(entry("m1", 2)).unwrap();
        log.append(entry("m2", 3)).unwrap();
        log.remove(1).unwrap();
    }

    let log = SledTransferLog::open(path).unwrap();
    assert_eq!(
        log.entries().unwrap(),
        vec![(2, entry("m1", 2)), (3, entry("m2", 3))]
    );
    assert_eq!(log.append(entry("m1", 4)).unwrap(), 4);
}

#[test]
fn test_sled_transfer_log_keeps_request_document() {
    let dir = tempdir().unwrap();
    let log = SledTransferLog::open(dir.path().join("transfer_log")).unwrap();

    let request = DataRequest::transfer_set_root("test", 3, 17);
    log.append(TransferEntry::new("m1", request.clone())).unwrap();

    let (_, stored) = log.entries().unwrap().remove(0);
    assert_eq!(stored.request, request);
    assert_eq!(stored.request.args_doc(), r#"{"Loc":17,"RootIdx":3,"StoreName":"test"}"#);
}
