//! In-process cluster.
//!
//! Members run inside one process and exchange requests through
//! [`ClusterManager::send`], which still encodes every request and response
//! with the wire protocol. Reachability is decided by a pluggable
//! [`MemberFaultInjector`].

use std::sync::Arc;
use std::sync::Weak;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;
use tracing::trace;

use super::protocol;
use super::ClusterManager;
use super::DataRequest;
use super::Member;
use super::MemberFaultInjector;
use super::MemberNode;
use crate::NetworkError;
use crate::Result;

pub struct LocalCluster {
    members: ArcSwap<Vec<Member>>,
    nodes: DashMap<String, Weak<MemberNode>>,
    faults: Arc<dyn MemberFaultInjector>,
}

impl std::fmt::Debug for LocalCluster {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LocalCluster")
            .field("members", &self.members.load_full())
            .field("faults", &self.faults)
            .finish()
    }
}

impl LocalCluster {
    pub fn new(faults: Arc<dyn MemberFaultInjector>) -> Self {
        Self::with_members(Vec::new(), faults)
    }

    /// Cluster with a membership known upfront. Members without a joined
    /// node are unreachable.
    pub fn with_members(
        members: Vec<Member>,
        faults: Arc<dyn MemberFaultInjector>,
    ) -> Self {
        Self {
            members: ArcSwap::from_pointee(members),
            nodes: DashMap::new(),
            faults,
        }
    }

    /// Attaches `node`; its member becomes part of the membership
    pub fn join(
        &self,
        node: &Arc<MemberNode>,
    ) {
        let member = node.member().clone();
        debug!("{} joins the local cluster", member);
        self.members.rcu(|current| {
            let mut next = Vec::clone(current);
            if !next.iter().any(|m| m.name == member.name) {
                next.push(member.clone());
            }
            next
        });
        self.nodes.insert(member.name.clone(), Arc::downgrade(node));
    }

    /// Removes `member` from the membership and detaches its node
    pub fn leave(
        &self,
        member: &str,
    ) {
        self.members.rcu(|current| {
            current
                .iter()
                .filter(|m| m.name != member)
                .cloned()
                .collect::<Vec<_>>()
        });
        self.nodes.remove(member);
    }

    fn node(
        &self,
        member: &str,
    ) -> Option<Arc<MemberNode>> {
        self.nodes.get(member).and_then(|node| node.value().upgrade())
    }
}

#[async_trait]
impl ClusterManager for LocalCluster {
    fn members(&self) -> Vec<Member> {
        self.members.load_full().to_vec()
    }

    fn is_reachable(
        &self,
        member: &str,
    ) -> bool {
        !self.faults.is_unreachable(member) && self.node(member).is_some()
    }

    async fn send(
        &self,
        target: &str,
        request: DataRequest,
    ) -> Result<Value> {
        if self.faults.is_unreachable(target) {
            return Err(NetworkError::Unreachable {
                member: target.to_string(),
            }
            .into());
        }
        let node = self
            .node(target)
            .ok_or_else(|| NetworkError::UnknownMember(target.to_string()))?;

        let wire = protocol::encode_request(&request)?;
        trace!("send to {}: {}", target, String::from_utf8_lossy(&wire));
        let request = protocol::decode_request(&wire)?;

        let result = node.handle_request(request).await;

        let wire = protocol::encode_response(&result)?;
        protocol::decode_response(target, &wire)
    }
}
