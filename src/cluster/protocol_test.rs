use serde_json::json;
use serde_json::Value;

use super::protocol::*;
use crate::Error;
use crate::NetworkError;
use crate::StorageError;

#[test]
fn test_args_doc_omits_absent_keys() {
    assert_eq!(
        DataRequest::transfer_free("test", 1).args_doc(),
        r#"{"Loc":1,"StoreName":"test"}"#
    );
    assert_eq!(
        DataRequest::transfer_update("test", 5, 3, b"x".to_vec()).args_doc(),
        r#"{"Loc":5,"StoreName":"test","Ver":3}"#
    );
    assert_eq!(
        DataRequest::transfer_set_root("test", 2, 7).args_doc(),
        r#"{"Loc":7,"RootIdx":2,"StoreName":"test"}"#
    );
    assert_eq!(
        DataRequest::routed_insert("test", b"x".to_vec()).args_doc(),
        r#"{"StoreName":"test"}"#
    );
}

#[test]
fn test_value_doc() {
    assert_eq!(DataRequest::transfer_free("test", 1).value_doc(), "null");
    assert_eq!(
        DataRequest::transfer_insert("test", 1, 1, b"test1".to_vec()).value_doc(),
        r#""test1""#
    );
}

#[test]
fn test_decode_request_with_defaults() {
    let request =
        decode_request(br#"{"request_type":"Free","args":{"Loc":1,"StoreName":"test"}}"#).unwrap();

    assert_eq!(request.request_type, RequestType::Free);
    assert_eq!(request.args.loc, Some(1));
    assert_eq!(request.args.root_index, None);
    assert_eq!(request.args.version, None);
    assert_eq!(request.value, None);
    assert!(!request.transfer);
}

#[test]
fn test_request_wire_format() {
    let request = DataRequest::transfer_update("test", 9, 2, vec![1, 2]);
    let doc: Value = serde_json::from_slice(&encode_request(&request).unwrap()).unwrap();

    assert_eq!(
        doc,
        json!({
            "request_type": "Update",
            "args": {"Loc": 9, "StoreName": "test", "Ver": 2},
            "value": [1, 2],
            "transfer": true
        })
    );
    assert_eq!(decode_request(&encode_request(&request).unwrap()).unwrap(), request);
}

#[test]
fn test_decode_garbage_is_protocol_error() {
    let e = decode_request(b"not json").unwrap_err();
    assert!(matches!(e, Error::Network(NetworkError::Protocol(_))));
    assert!(e.is_transport_fault());
}

#[test]
fn test_missing_location_is_rejected() {
    let request = DataRequest::routed_insert("test", vec![]);
    assert!(matches!(
        request.require_loc(),
        Err(Error::Network(NetworkError::Protocol(_)))
    ));
    assert!(request.require_root_index().is_err());
}

#[test]
fn test_null_result_is_not_an_error() {
    let wire = encode_response(&Ok(Value::Null)).unwrap();
    assert_eq!(decode_response("m1", &wire).unwrap(), Value::Null);

    let wire = encode_response(&Ok(json!(1666))).unwrap();
    assert_eq!(decode_response("m1", &wire).unwrap(), json!(1666));
}

fn roundtrip(error: Error) -> Error {
    let wire = encode_response(&Err(error)).unwrap();
    decode_response("m1", &wire).unwrap_err()
}

#[test]
fn test_error_documents_map_back_to_typed_errors() {
    let e = roundtrip(
        StorageError::SlotNotFound {
            store: "test".into(),
            location: 4,
        }
        .into(),
    );
    assert!(e.is_slot_not_found());

    let e = roundtrip(
        StorageError::NotInCache {
            store: "test".into(),
            location: 4,
        }
        .into(),
    );
    assert!(e.is_not_in_cache());

    let e = roundtrip(
        StorageError::Fault {
            store: "test".into(),
            location: 4,
            reason: "conflict".into(),
        }
        .into(),
    );
    assert!(e.is_storage_fault());

    let e = roundtrip(
        NetworkError::NotResponsible {
            member: "m2".into(),
            store: "test".into(),
            location: 4,
        }
        .into(),
    );
    assert!(matches!(e, Error::Network(NetworkError::NotResponsible { member, .. }) if member == "m1"));

    let e = roundtrip(Error::Fatal("boom".into()));
    assert!(matches!(
        e,
        Error::Network(NetworkError::Remote { member, detail }) if member == "m1" && detail.contains("boom")
    ));
}

#[test]
fn test_error_doc_keeps_location() {
    let doc = ErrorDoc::from_error(
        &StorageError::Fault {
            store: "test".into(),
            location: 12,
            reason: "medium conflict".into(),
        }
        .into(),
    );
    assert_eq!(doc.kind, ErrorKind::StorageFault);
    assert_eq!(doc.store, "test");
    assert_eq!(doc.loc, 12);
    assert_eq!(doc.detail, "medium conflict");
}
