use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Member;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterConfig {
    /// Name of this member, must appear in `members`
    #[serde(default = "default_member_name")]
    pub member_name: String,

    /// Storage directory name shown in layout dumps
    #[serde(default = "default_storage_id")]
    pub storage_id: String,

    /// Full membership, including this member
    #[serde(default = "default_members")]
    pub members: Vec<Member>,

    #[serde(default = "default_db_dir")]
    pub db_root_dir: PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            member_name: default_member_name(),
            storage_id: default_storage_id(),
            members: default_members(),
            db_root_dir: default_db_dir(),
            log_dir: default_log_dir(),
        }
    }
}

impl ClusterConfig {
    /// Validates cluster configuration consistency
    /// # Errors
    /// Returns `Error::InvalidConfig` if any configuration rules are violated
    pub fn validate(&self) -> Result<()> {
        if self.member_name.is_empty() {
            return Err(Error::InvalidConfig("member_name cannot be empty".into()));
        }

        if self.members.is_empty() {
            return Err(Error::InvalidConfig(
                "members must contain at least one member".into(),
            ));
        }

        if !self.members.iter().any(|m| m.name == self.member_name) {
            return Err(Error::InvalidConfig(format!(
                "Current member {} not found in members",
                self.member_name
            )));
        }

        let mut names = HashSet::new();
        for member in &self.members {
            if !names.insert(member.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "Duplicate member name {} in members",
                    member.name
                )));
            }
        }

        if self.db_root_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("db_root_dir path cannot be empty".into()));
        }
        if self.log_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("log_dir path cannot be empty".into()));
        }

        Ok(())
    }
}

fn default_member_name() -> String {
    "member-1".to_string()
}
fn default_storage_id() -> String {
    "mgs1".to_string()
}
fn default_members() -> Vec<Member> {
    vec![Member::new("member-1", "127.0.0.1:9081")]
}
fn default_db_dir() -> PathBuf {
    PathBuf::from("/tmp/dstore/db")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("/tmp/dstore/logs")
}
