//! Replication layer.
//!
//! Every member hosts a [`MemberNode`] which applies client writes to its
//! local stores and forwards them to the other replicas chosen by the
//! [`DistributionTable`]. Forwards that fail end up in the transfer log and
//! are replayed by housekeeping.

mod builder;
mod cluster_manager;
mod distribution;
mod housekeeping;
mod local_cluster;
mod member;
mod member_node;
mod member_storage_manager;
pub mod protocol;

#[cfg(test)]
mod local_cluster_test;
#[cfg(test)]
mod protocol_test;

pub use builder::*;
pub use cluster_manager::*;
pub use distribution::DistributionTable;
pub use housekeeping::*;
pub use local_cluster::*;
pub use member::*;
pub use member_node::MemberNode;
pub use member_node::StorageFactory;
pub use member_storage_manager::*;
pub use protocol::DataRequest;
pub use protocol::ErrorDoc;
pub use protocol::ErrorKind;
pub use protocol::RequestArgs;
pub use protocol::RequestType;
pub use protocol::ResponseDoc;

use std::sync::Arc;

/// Layout dumps of `store` on every node, in the given order
pub fn cluster_layout(
    nodes: &[Arc<MemberNode>],
    store: &str,
) -> String {
    nodes.iter().map(|node| node.layout(store)).collect()
}
