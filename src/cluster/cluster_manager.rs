use std::fmt::Debug;

use async_trait::async_trait;
use dashmap::DashSet;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use super::DataRequest;
use super::Member;
use crate::Result;

/// Membership, reachability and request transport of the cluster a member
/// belongs to.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterManager: Send + Sync + 'static {
    /// Current membership, including the calling member and members that
    /// are unreachable at the moment.
    fn members(&self) -> Vec<Member>;

    fn is_reachable(
        &self,
        member: &str,
    ) -> bool;

    /// Delivers `request` to `target` and returns its result document.
    /// Errors raised by the target come back typed.
    async fn send(
        &self,
        target: &str,
        request: DataRequest,
    ) -> Result<Value>;
}

/// Decides which members the in-process cluster treats as unreachable
pub trait MemberFaultInjector: Send + Sync + Debug + 'static {
    fn is_unreachable(
        &self,
        member: &str,
    ) -> bool;
}

#[derive(Debug, Default)]
pub struct NoMemberFaults;

impl MemberFaultInjector for NoMemberFaults {
    fn is_unreachable(
        &self,
        _member: &str,
    ) -> bool {
        false
    }
}

/// Set of members cut off from the rest of the cluster
#[derive(Debug, Default)]
pub struct UnreachableMembers {
    members: DashSet<String>,
}

impl UnreachableMembers {
    pub fn mark_unreachable(
        &self,
        member: &str,
    ) {
        self.members.insert(member.to_string());
    }

    pub fn restore(
        &self,
        member: &str,
    ) {
        self.members.remove(member);
    }
}

impl MemberFaultInjector for UnreachableMembers {
    fn is_unreachable(
        &self,
        member: &str,
    ) -> bool {
        self.members.contains(member)
    }
}
