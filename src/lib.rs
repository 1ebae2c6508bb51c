//! Slot-based record storage replicated across cluster members.
//!
//! Layers, bottom up:
//! - [`StorageManager`]: local store with lowest-first location reuse,
//!   versioned records and a root table
//! - [`DistributionTable`]: which members hold a cluster location
//! - [`MemberNode`] / [`MemberStorageManager`]: apply locally, forward to
//!   replicas, queue failed forwards in the [`TransferLog`]
//! - housekeeping: replays the transfer log and repairs divergent replicas

mod cluster;
mod config;
mod constants;
mod errors;
mod metrics;
mod storage;
mod transfer;
pub mod utils;

pub use cluster::*;
pub use config::*;
pub use errors::*;
pub use metrics::*;
pub use storage::*;
pub use transfer::*;
pub use utils::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
