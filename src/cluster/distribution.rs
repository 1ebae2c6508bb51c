//! Location to member assignment.
//!
//! The distribution range is cut into one contiguous slice per member of
//! the name-ordered membership; the last member's slice absorbs the
//! remainder. The owner of the slice a location falls into is its primary
//! and allocates cluster locations from that slice. The next
//! `replication_factor - 1` members, wrapping around, hold replicas.

use std::ops::Range;

use super::Member;
use crate::Error;
use crate::Location;
use crate::ReplicationConfig;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributionTable {
    replication_factor: usize,
    distribution_range: u64,
}

impl DistributionTable {
    pub fn new(config: &ReplicationConfig) -> Result<Self> {
        if config.replication_factor == 0 {
            return Err(Error::InvalidConfig("replication_factor must be > 0".into()));
        }
        if config.distribution_range == 0 {
            return Err(Error::InvalidConfig("distribution_range must be > 0".into()));
        }
        Ok(Self {
            replication_factor: config.replication_factor,
            distribution_range: config.distribution_range,
        })
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    pub fn distribution_range(&self) -> u64 {
        self.distribution_range
    }

    /// Bucket of `loc` inside the distribution range. Stores share the
    /// same assignment, so the store name does not take part.
    ///
    /// Intentionally plain `loc % distribution_range` with no hashing: a
    /// location always lands in the slice of the primary that allocated it.
    pub fn bucket(
        &self,
        _store: &str,
        loc: Location,
    ) -> u64 {
        loc % self.distribution_range
    }

    /// Replica set of `loc`, primary first. Holds `min(replication_factor,
    /// members)` distinct members; empty without members.
    pub fn members_for(
        &self,
        members: &[Member],
        store: &str,
        loc: Location,
    ) -> Vec<Member> {
        let ordered = ordered_members(members);
        if ordered.is_empty() {
            return Vec::new();
        }
        let n = ordered.len();
        let primary = self.slice_index(n, self.bucket(store, loc));
        (0..self.replication_factor.min(n))
            .map(|offset| ordered[(primary + offset) % n].clone())
            .collect()
    }

    pub fn is_replica(
        &self,
        members: &[Member],
        store: &str,
        loc: Location,
        member: &str,
    ) -> bool {
        self.members_for(members, store, loc)
            .iter()
            .any(|m| m.name == member)
    }

    /// Cluster locations `member` allocates from as primary. Location 0 is
    /// never handed out. `None` if `member` is not part of `members`.
    pub fn location_range(
        &self,
        members: &[Member],
        member: &str,
    ) -> Option<Range<Location>> {
        let ordered = ordered_members(members);
        let n = ordered.len();
        let index = ordered.iter().position(|m| m.name == member)?;
        let size = self.slice_size(n);
        let start = (index as u64 * size).min(self.distribution_range);
        let end = if index == n - 1 {
            self.distribution_range
        } else {
            (start + size).min(self.distribution_range)
        };
        Some(start.max(1)..end)
    }

    fn slice_size(
        &self,
        n: usize,
    ) -> u64 {
        (self.distribution_range / n as u64).max(1)
    }

    fn slice_index(
        &self,
        n: usize,
        bucket: u64,
    ) -> usize {
        let index = bucket / self.slice_size(n);
        (index.min(n as u64 - 1)) as usize
    }
}

/// Membership ordered by name without duplicates
pub(crate) fn ordered_members(members: &[Member]) -> Vec<Member> {
    let mut ordered = members.to_vec();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));
    ordered.dedup_by(|a, b| a.name == b.name);
    ordered
}
