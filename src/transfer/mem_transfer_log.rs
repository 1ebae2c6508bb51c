use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::TransferEntry;
use super::TransferLog;
use super::TransferSeq;
use crate::Result;

/// Volatile transfer log. Pending entries are lost with the process.
#[derive(Debug)]
pub struct MemTransferLog {
    state: Mutex<MemTransferState>,
}

#[derive(Debug)]
struct MemTransferState {
    entries: BTreeMap<TransferSeq, TransferEntry>,
    next_seq: TransferSeq,
}

impl MemTransferLog {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemTransferState {
                entries: BTreeMap::new(),
                next_seq: 1,
            }),
        }
    }
}

impl Default for MemTransferLog {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferLog for MemTransferLog {
    fn append(
        &self,
        entry: TransferEntry,
    ) -> Result<TransferSeq> {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(seq, entry);
        Ok(seq)
    }

    fn entries(&self) -> Result<Vec<(TransferSeq, TransferEntry)>> {
        Ok(self
            .state
            .lock()
            .entries
            .iter()
            .map(|(seq, entry)| (*seq, entry.clone()))
            .collect())
    }

    fn remove(
        &self,
        seq: TransferSeq,
    ) -> Result<()> {
        self.state.lock().entries.remove(&seq);
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.state.lock().entries.len())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
