//! Durable transfer log on top of a sled tree.
//!
//! Keys are big-endian sequence numbers so iteration order is enqueue
//! order. Values are JSON documents of [`TransferEntry`].

use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::TransferEntry;
use super::TransferLog;
use super::TransferSeq;
use crate::constants::TRANSFER_LOG_TREE;
use crate::convert::safe_kv;
use crate::convert::safe_vk;
use crate::Result;
use crate::StorageError;

pub struct SledTransferLog {
    db: sled::Db,
    tree: sled::Tree,
    next_seq: AtomicU64,
}

impl std::fmt::Debug for SledTransferLog {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledTransferLog")
            .field("tree_len", &self.tree.len())
            .field("next_seq", &self.next_seq.load(Ordering::Acquire))
            .finish()
    }
}

impl Drop for SledTransferLog {
    fn drop(&mut self) {
        match self.flush() {
            Ok(_) => info!("Successfully flush TransferLog"),
            Err(e) => error!(?e, "Failed to flush TransferLog"),
        }
    }
}

impl SledTransferLog {
    /// Opens (or creates) the transfer log database under `path`
    pub fn open(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        debug!("open transfer log db from path: {:?}", &path);

        let db = sled::Config::default()
            .path(path.as_ref())
            .use_compression(true)
            .compression_factor(1)
            .open()
            .map_err(|e| {
                warn!("Try to open DB at this location: {:?} and failed: {:?}", path, e);
                StorageError::Sled(e)
            })?;
        Self::from_db(db)
    }

    pub fn from_db(db: sled::Db) -> Result<Self> {
        let tree = db.open_tree(TRANSFER_LOG_TREE).map_err(StorageError::Sled)?;
        let next_seq = match tree.last().map_err(StorageError::Sled)? {
            Some((key, _)) => safe_vk(&key)? + 1,
            None => 1,
        };
        debug!("transfer log reopened, next seq: {}", next_seq);

        Ok(Self {
            db,
            tree,
            next_seq: AtomicU64::new(next_seq),
        })
    }
}

impl TransferLog for SledTransferLog {
    fn append(
        &self,
        entry: TransferEntry,
    ) -> Result<TransferSeq> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let value = serde_json::to_vec(&entry).map_err(StorageError::Json)?;
        self.tree.insert(safe_kv(seq), value).map_err(StorageError::Sled)?;
        Ok(seq)
    }

    fn entries(&self) -> Result<Vec<(TransferSeq, TransferEntry)>> {
        let mut entries = Vec::new();
        for item in self.tree.iter() {
            let (key, value) = item.map_err(StorageError::Sled)?;
            let entry: TransferEntry = serde_json::from_slice(&value).map_err(StorageError::Json)?;
            entries.push((safe_vk(&key)?, entry));
        }
        Ok(entries)
    }

    fn remove(
        &self,
        seq: TransferSeq,
    ) -> Result<()> {
        self.tree.remove(safe_kv(seq)).map_err(StorageError::Sled)?;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.tree.len())
    }

    fn flush(&self) -> Result<()> {
        self.db.flush().map_err(StorageError::Sled)?;
        Ok(())
    }
}
