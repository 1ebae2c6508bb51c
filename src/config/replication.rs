use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReplicationConfig {
    /// Number of members holding a copy of each location (primary included)
    #[serde(default = "default_replication_factor")]
    pub replication_factor: usize,

    /// Size of the cluster location space split between members
    #[serde(default = "default_distribution_range")]
    pub distribution_range: u64,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            replication_factor: default_replication_factor(),
            distribution_range: default_distribution_range(),
        }
    }
}

impl ReplicationConfig {
    pub fn validate(
        &self,
        member_count: usize,
    ) -> Result<()> {
        if self.replication_factor == 0 {
            return Err(Error::InvalidConfig(
                "replication_factor must be greater than 0".into(),
            ));
        }

        // every member needs a non-empty slice besides the reserved location 0
        if self.distribution_range <= member_count as u64 {
            return Err(Error::InvalidConfig(format!(
                "distribution_range {} must be greater than the member count {}",
                self.distribution_range, member_count
            )));
        }

        Ok(())
    }
}

fn default_replication_factor() -> usize {
    1
}
fn default_distribution_range() -> u64 {
    u64::MAX
}
