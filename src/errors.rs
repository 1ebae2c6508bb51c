//! Replicated Storage Error Hierarchy
//!
//! Errors are split by the layer that produced them: local slot storage
//! faults ([`StorageError`]) and member-to-member transport faults
//! ([`NetworkError`]). Transport faults raised while forwarding a write are
//! absorbed into the transfer log and never reach the foreground caller.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

use crate::Location;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Local slot storage failures
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Member-to-member communication failures
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Retry timeout")]
    RetryTimeoutError,

    #[error("{0}")]
    RetryTaskFailed(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Operation addressed a location that holds no live record
    #[error("Slot {location} not found in store {store}")]
    SlotNotFound { store: String, location: Location },

    /// Cache-only fetch could not be served from the cache layer
    #[error("Slot {location} of store {store} is not in cache")]
    NotInCache { store: String, location: Location },

    /// Backing medium contention or corruption
    #[error("Storage fault at slot {location} of store {store}: {reason}")]
    Fault {
        store: String,
        location: Location,
        reason: String,
    },

    #[error("Root index {index} out of range (root table has {size} slots)")]
    RootIndexOutOfRange { index: usize, size: usize },

    /// The primary has handed out every cluster location of its slice
    #[error("No cluster location left in {start}..{end} for store {store}")]
    LocationRangeExhausted {
        store: String,
        start: Location,
        end: Location,
    },

    /// Embedded database errors
    #[error(transparent)]
    Sled(#[from] sled::Error),

    /// Object payload encoding failures
    #[error(transparent)]
    Bincode(#[from] bincode::Error),

    /// Transfer log entry encoding failures
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Corrupted transfer log key: {0:?}")]
    CorruptedKey(Vec<u8>),
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Target member cannot be contacted
    #[error("Member {member} is unreachable")]
    Unreachable { member: String },

    /// Forwarding did not finish in time
    #[error("Request to {member} timed out after {duration:?}")]
    Timeout { member: String, duration: Duration },

    #[error("Unknown member {0}")]
    UnknownMember(String),

    /// Target answered with an error document that has no local counterpart
    #[error("Remote error from {member}: {detail}")]
    Remote { member: String, detail: String },

    /// Malformed request or response document
    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("No reachable member holds {store}/{location}")]
    NoReachableReplica { store: String, location: Location },

    /// A routed request arrived at a member outside the replica set
    #[error("Member {member} does not hold {store}/{location}")]
    NotResponsible {
        member: String,
        store: String,
        location: Location,
    },

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("{0}")]
    SignalSendFailed(String),
}

impl Error {
    pub fn is_slot_not_found(&self) -> bool {
        matches!(self, Error::Storage(StorageError::SlotNotFound { .. }))
    }

    pub fn is_not_in_cache(&self) -> bool {
        matches!(self, Error::Storage(StorageError::NotInCache { .. }))
    }

    /// Backing-medium fault, distinct from "never existed"
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, Error::Storage(StorageError::Fault { .. }))
    }

    pub fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            Error::Network(
                NetworkError::Unreachable { .. }
                    | NetworkError::Timeout { .. }
                    | NetworkError::UnknownMember(_)
                    | NetworkError::Protocol(_)
            ) | Error::RetryTimeoutError
                | Error::RetryTaskFailed(_)
        )
    }
}
