//! Remote apply protocol.
//!
//! Requests and responses travel as self-describing JSON documents. Queued
//! transfer entries are replayed against this format after arbitrary delay,
//! so field names are part of the stable surface:
//!
//! ```text
//! {"request_type":"Free","args":{"Loc":1,"StoreName":"test"},"value":null,"transfer":true}
//! ```

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::Error;
use crate::Location;
use crate::NetworkError;
use crate::Result;
use crate::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    Insert,
    Update,
    Free,
    Fetch,
    SetRoot,
}

impl fmt::Display for RequestType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Argument document of a request. Absent keys are omitted on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestArgs {
    #[serde(rename = "Loc", default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,

    #[serde(rename = "RootIdx", default, skip_serializing_if = "Option::is_none")]
    pub root_index: Option<usize>,

    #[serde(rename = "StoreName")]
    pub store_name: String,

    #[serde(rename = "Ver", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequest {
    pub request_type: RequestType,
    pub args: RequestArgs,
    #[serde(default)]
    pub value: Option<Vec<u8>>,
    /// Apply on the receiving member only. Routed client requests leave this
    /// unset so the receiver replicates them further.
    #[serde(default)]
    pub transfer: bool,
}

impl DataRequest {
    fn new(
        request_type: RequestType,
        store_name: &str,
        transfer: bool,
    ) -> Self {
        Self {
            request_type,
            args: RequestArgs {
                store_name: store_name.to_string(),
                ..RequestArgs::default()
            },
            value: None,
            transfer,
        }
    }

    /// Insert routed to the primary, which allocates the location
    pub fn routed_insert(
        store_name: &str,
        value: Vec<u8>,
    ) -> Self {
        let mut request = Self::new(RequestType::Insert, store_name, false);
        request.value = Some(value);
        request
    }

    pub fn routed_update(
        store_name: &str,
        loc: Location,
        value: Vec<u8>,
    ) -> Self {
        let mut request = Self::new(RequestType::Update, store_name, false);
        request.args.loc = Some(loc);
        request.value = Some(value);
        request
    }

    pub fn routed_free(
        store_name: &str,
        loc: Location,
    ) -> Self {
        let mut request = Self::new(RequestType::Free, store_name, false);
        request.args.loc = Some(loc);
        request
    }

    pub fn routed_fetch(
        store_name: &str,
        loc: Location,
    ) -> Self {
        let mut request = Self::new(RequestType::Fetch, store_name, false);
        request.args.loc = Some(loc);
        request
    }

    pub fn transfer_insert(
        store_name: &str,
        loc: Location,
        version: u64,
        value: Vec<u8>,
    ) -> Self {
        let mut request = Self::new(RequestType::Insert, store_name, true);
        request.args.loc = Some(loc);
        request.args.version = Some(version);
        request.value = Some(value);
        request
    }

    pub fn transfer_update(
        store_name: &str,
        loc: Location,
        version: u64,
        value: Vec<u8>,
    ) -> Self {
        let mut request = Self::transfer_insert(store_name, loc, version, value);
        request.request_type = RequestType::Update;
        request
    }

    pub fn transfer_free(
        store_name: &str,
        loc: Location,
    ) -> Self {
        let mut request = Self::new(RequestType::Free, store_name, true);
        request.args.loc = Some(loc);
        request
    }

    pub fn transfer_set_root(
        store_name: &str,
        index: usize,
        loc: Location,
    ) -> Self {
        let mut request = Self::new(RequestType::SetRoot, store_name, true);
        request.args.root_index = Some(index);
        request.args.loc = Some(loc);
        request
    }

    pub fn store_name(&self) -> &str {
        &self.args.store_name
    }

    /// Location argument, or a protocol error when the request lacks one
    pub fn require_loc(&self) -> Result<Location> {
        self.args.loc.ok_or_else(|| self.missing("Loc"))
    }

    pub fn require_root_index(&self) -> Result<usize> {
        self.args.root_index.ok_or_else(|| self.missing("RootIdx"))
    }

    fn missing(
        &self,
        key: &str,
    ) -> Error {
        Error::Network(NetworkError::Protocol(serde::de::Error::custom(format!(
            "{} request without {}",
            self.request_type, key
        ))))
    }

    /// Argument document as sent on the wire
    pub fn args_doc(&self) -> String {
        serde_json::to_string(&self.args).unwrap_or_default()
    }

    /// Payload rendered for diagnostics, `null` when absent
    pub fn value_doc(&self) -> String {
        let value = self.value.as_deref().map(String::from_utf8_lossy);
        serde_json::to_string(&value).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    SlotNotFound,
    NotInCache,
    StorageFault,
    NotResponsible,
    Other,
}

/// Error document, distinguishable from a `null` success result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDoc {
    pub kind: ErrorKind,
    pub detail: String,
    #[serde(default)]
    pub store: String,
    #[serde(default)]
    pub loc: Location,
}

impl ErrorDoc {
    pub fn from_error(error: &Error) -> Self {
        let (kind, store, loc) = match error {
            Error::Storage(StorageError::SlotNotFound { store, location }) => {
                (ErrorKind::SlotNotFound, store.clone(), *location)
            }
            Error::Storage(StorageError::NotInCache { store, location }) => {
                (ErrorKind::NotInCache, store.clone(), *location)
            }
            Error::Storage(StorageError::Fault { store, location, .. }) => {
                (ErrorKind::StorageFault, store.clone(), *location)
            }
            Error::Network(NetworkError::NotResponsible { store, location, .. }) => {
                (ErrorKind::NotResponsible, store.clone(), *location)
            }
            _ => (ErrorKind::Other, String::new(), 0),
        };
        let detail = match error {
            Error::Storage(StorageError::Fault { reason, .. }) => reason.clone(),
            e => e.to_string(),
        };
        Self {
            kind,
            detail,
            store,
            loc,
        }
    }

    /// Rebuilds the typed error raised by `member`
    pub fn into_error(
        self,
        member: &str,
    ) -> Error {
        match self.kind {
            ErrorKind::SlotNotFound => StorageError::SlotNotFound {
                store: self.store,
                location: self.loc,
            }
            .into(),
            ErrorKind::NotInCache => StorageError::NotInCache {
                store: self.store,
                location: self.loc,
            }
            .into(),
            ErrorKind::StorageFault => StorageError::Fault {
                store: self.store,
                location: self.loc,
                reason: self.detail,
            }
            .into(),
            ErrorKind::NotResponsible => NetworkError::NotResponsible {
                member: member.to_string(),
                store: self.store,
                location: self.loc,
            }
            .into(),
            ErrorKind::Other => NetworkError::Remote {
                member: member.to_string(),
                detail: self.detail,
            }
            .into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDoc {
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDoc>,
}

pub fn encode_request(request: &DataRequest) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(request).map_err(NetworkError::Protocol)?)
}

pub fn decode_request(bytes: &[u8]) -> Result<DataRequest> {
    Ok(serde_json::from_slice(bytes).map_err(NetworkError::Protocol)?)
}

pub fn encode_response(result: &Result<Value>) -> Result<Vec<u8>> {
    let doc = match result {
        Ok(value) => ResponseDoc {
            result: value.clone(),
            error: None,
        },
        Err(e) => ResponseDoc {
            result: Value::Null,
            error: Some(ErrorDoc::from_error(e)),
        },
    };
    Ok(serde_json::to_vec(&doc).map_err(NetworkError::Protocol)?)
}

/// Decodes the response of `member`, turning an error document back into
/// a typed error.
pub fn decode_response(
    member: &str,
    bytes: &[u8],
) -> Result<Value> {
    let doc: ResponseDoc = serde_json::from_slice(bytes).map_err(NetworkError::Protocol)?;
    match doc.error {
        Some(error) => Err(error.into_error(member)),
        None => Ok(doc.result),
    }
}
