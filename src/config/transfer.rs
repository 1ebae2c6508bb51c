use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransferConfig {
    /// Keep pending transfers in sled so they survive restarts
    #[serde(default = "default_persistent")]
    pub persistent: bool,

    /// Sled directory, relative paths resolve against `cluster.db_root_dir`
    #[serde(default = "default_transfer_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            persistent: default_persistent(),
            log_dir: default_transfer_log_dir(),
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<()> {
        if self.persistent && self.log_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "transfer log_dir cannot be empty when persistent".into(),
            ));
        }
        Ok(())
    }
}

fn default_persistent() -> bool {
    false
}
fn default_transfer_log_dir() -> PathBuf {
    PathBuf::from("transfer_log")
}
