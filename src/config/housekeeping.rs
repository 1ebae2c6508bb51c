use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HousekeepingConfig {
    /// Interval between two housekeeping passes (unit: milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Start the periodic worker together with the member
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            enabled: default_enabled(),
        }
    }
}

impl HousekeepingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(Error::InvalidConfig("housekeeping interval_ms cannot be 0".into()));
        }
        Ok(())
    }
}

fn default_interval_ms() -> u64 {
    1000
}
fn default_enabled() -> bool {
    true
}
