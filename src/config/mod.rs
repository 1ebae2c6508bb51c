//! Configuration management for a replicated storage member.
//!
//! Settings are loaded from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. Config file passed by the caller
//! 3. Config file named by `CONFIG_PATH`
//! 4. Environment variables prefixed with `DSTORE__` (highest priority)

mod cluster;
mod housekeeping;
mod replication;
mod retry;
mod transfer;
pub use cluster::*;
pub use housekeeping::*;
pub use replication::*;
pub use retry::*;
pub use transfer::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Member identity, peers and storage paths
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Replication factor and distribution range
    #[serde(default)]
    pub replication: ReplicationConfig,
    /// Periodic repair pass
    #[serde(default)]
    pub housekeeping: HousekeepingConfig,
    /// Transfer log backend
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Retry policies for member-to-member requests
    #[serde(default)]
    pub retry: RetryPolicies,
}

impl Settings {
    /// Load configuration from multiple sources with priority:
    /// 1. Hardcoded defaults
    /// 2. `config_path` (must exist when given)
    /// 3. File named by `CONFIG_PATH`
    /// 4. Environment variables
    ///
    /// # Returns
    /// Merged and validated configuration
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        if let Some(path) = config_path {
            config = config.add_source(File::with_name(path).required(true));
        }

        if let Ok(path) = env::var("CONFIG_PATH") {
            config = config.add_source(File::with_name(&path));
        }

        config = config.add_source(
            Environment::with_prefix("DSTORE")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.cluster.validate()?;
        self.replication.validate(self.cluster.members.len())?;
        self.housekeeping.validate()?;
        self.transfer.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}
