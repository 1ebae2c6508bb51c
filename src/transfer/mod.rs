//! Transfer log: pending remote operations of one member.
//!
//! A forward that cannot be applied on its target right away is appended
//! here and replayed later by the [`TransferWorker`]. Entries of one target
//! are applied in sequence order; an entry leaves the log only once its
//! target acknowledged it or a newer write superseded it.

mod mem_transfer_log;
mod sled_transfer_log;
mod transfer_worker;

#[cfg(test)]
mod transfer_log_test;

pub use mem_transfer_log::*;
pub use sled_transfer_log::*;
pub use transfer_worker::*;

#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;

use crate::DataRequest;
use crate::Result;

/// Sequence number of a transfer entry, unique per log
pub type TransferSeq = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEntry {
    /// Member the request is addressed to
    pub target: String,
    pub request: DataRequest,
}

impl TransferEntry {
    pub fn new(
        target: impl Into<String>,
        request: DataRequest,
    ) -> Self {
        Self {
            target: target.into(),
            request,
        }
    }
}

#[cfg_attr(test, automock)]
pub trait TransferLog: Send + Sync + 'static {
    fn append(
        &self,
        entry: TransferEntry,
    ) -> Result<TransferSeq>;

    /// All pending entries in sequence order
    fn entries(&self) -> Result<Vec<(TransferSeq, TransferEntry)>>;

    fn entries_for(
        &self,
        target: &str,
    ) -> Result<Vec<(TransferSeq, TransferEntry)>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|(_, entry)| entry.target == target)
            .collect())
    }

    /// Removing an unknown sequence number is a no-op
    fn remove(
        &self,
        seq: TransferSeq,
    ) -> Result<()>;

    /// Targets with pending entries, ordered by their oldest entry
    fn targets(&self) -> Result<Vec<String>> {
        let mut targets: Vec<String> = Vec::new();
        for (_, entry) in self.entries()? {
            if !targets.contains(&entry.target) {
                targets.push(entry.target);
            }
        }
        Ok(targets)
    }

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn flush(&self) -> Result<()>;
}
