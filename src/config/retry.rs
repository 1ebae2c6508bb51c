use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Basic retry policy template
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Maximum number of attempts (0 is treated as a single attempt)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Single operation timeout (unit: milliseconds)
    #[serde(default = "default_op_timeout_ms")]
    pub timeout_ms: u64,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_op_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    fn validate(
        &self,
        name: &str,
    ) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig(format!("retry.{name}.timeout_ms cannot be 0")));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::InvalidConfig(format!(
                "retry.{name}.base_delay_ms {} exceeds max_delay_ms {}",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Divide strategies by request kind
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryPolicies {
    // Foreground replication of a local write, falls back to the transfer log
    #[serde(default = "default_forward")]
    pub forward: BackoffPolicy,

    // Requests routed to the member that owns a location
    #[serde(default = "default_routing")]
    pub routing: BackoffPolicy,

    // Transfer log replay
    #[serde(default = "default_transfer")]
    pub transfer: BackoffPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            forward: default_forward(),
            routing: default_routing(),
            transfer: default_transfer(),
        }
    }
}

impl RetryPolicies {
    pub fn validate(&self) -> Result<()> {
        self.forward.validate("forward")?;
        self.routing.validate("routing")?;
        self.transfer.validate("transfer")?;
        Ok(())
    }
}

fn default_forward() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 1,
        timeout_ms: 100,
        base_delay_ms: 50,
        max_delay_ms: 1000,
    }
}
fn default_routing() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 3,
        timeout_ms: 200,
        base_delay_ms: 50,
        max_delay_ms: 1000,
    }
}
fn default_transfer() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 1,
        timeout_ms: 500,
        base_delay_ms: 50,
        max_delay_ms: 1000,
    }
}
fn default_max_retries() -> usize {
    1
}
fn default_op_timeout_ms() -> u64 {
    100
}
fn default_base_delay_ms() -> u64 {
    50
}
fn default_max_delay_ms() -> u64 {
    1000
}
