use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::AccessFaultInjector;
use super::AccessOp;
use super::InjectedFault;
use super::Location;
use super::StorageManager;
use super::ROOT_COUNT;
use crate::Result;
use crate::StorageError;

/// In-memory slot store.
///
/// All state sits behind one lock so concurrent callers observe a single
/// apply order. Every record is always "cached"; an attached
/// [`AccessFaultInjector`] can still force cache misses and medium faults.
pub struct MemoryStorageManager {
    name: String,
    state: Mutex<MemoryState>,
    faults: Option<Arc<dyn AccessFaultInjector>>,
}

#[derive(Debug)]
struct MemoryState {
    roots: [Location; ROOT_COUNT],
    records: BTreeMap<Location, Record>,
    free_list: BTreeSet<Location>,
    /// Next never-used location
    loc_count: Location,
}

#[derive(Debug, Clone)]
struct Record {
    data: Vec<u8>,
    version: u64,
}

impl fmt::Debug for MemoryStorageManager {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("MemoryStorageManager")
            .field("name", &self.name)
            .field("records", &self.state.lock().records.len())
            .finish()
    }
}

impl MemoryStorageManager {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState {
                roots: [0; ROOT_COUNT],
                records: BTreeMap::new(),
                free_list: BTreeSet::new(),
                loc_count: 1,
            }),
            faults: None,
        }
    }

    pub fn with_fault_injector(
        name: impl Into<String>,
        faults: Arc<dyn AccessFaultInjector>,
    ) -> Self {
        let mut manager = Self::new(name);
        manager.faults = Some(faults);
        manager
    }

    /// Location the next insert will use
    pub fn next_location(&self) -> Location {
        let state = self.state.lock();
        state.free_list.first().copied().unwrap_or(state.loc_count)
    }

    fn check_access(
        &self,
        op: AccessOp,
        loc: Location,
    ) -> Result<()> {
        let Some(fault) = self.faults.as_ref().and_then(|f| f.decide(op, loc)) else {
            return Ok(());
        };
        trace!("{}: injected {:?} on {:?} at {}", self.name, fault, op, loc);

        let err = match fault {
            InjectedFault::NotInCache => StorageError::NotInCache {
                store: self.name.clone(),
                location: loc,
            },
            InjectedFault::SlotNotFound => self.slot_not_found(loc),
            InjectedFault::AccessConflict => StorageError::Fault {
                store: self.name.clone(),
                location: loc,
                reason: "slot is already in use".to_string(),
            },
        };
        Err(err.into())
    }

    fn slot_not_found(
        &self,
        loc: Location,
    ) -> StorageError {
        StorageError::SlotNotFound {
            store: self.name.clone(),
            location: loc,
        }
    }

    fn check_root_index(index: usize) -> Result<()> {
        if index >= ROOT_COUNT {
            return Err(StorageError::RootIndexOutOfRange {
                index,
                size: ROOT_COUNT,
            }
            .into());
        }
        Ok(())
    }
}

impl StorageManager for MemoryStorageManager {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn insert(
        &self,
        value: Vec<u8>,
    ) -> Result<Location> {
        let mut state = self.state.lock();
        let loc = state.free_list.first().copied().unwrap_or(state.loc_count);
        self.check_access(AccessOp::Insert, loc)?;

        if !state.free_list.remove(&loc) {
            state.loc_count += 1;
        }
        state.records.insert(loc, Record { data: value, version: 1 });
        trace!("{}: insert at {}", self.name, loc);
        Ok(loc)
    }

    fn fetch(
        &self,
        loc: Location,
    ) -> Result<Vec<u8>> {
        self.check_access(AccessOp::Fetch, loc)?;
        let state = self.state.lock();
        state
            .records
            .get(&loc)
            .map(|r| r.data.clone())
            .ok_or_else(|| self.slot_not_found(loc).into())
    }

    fn fetch_cached(
        &self,
        loc: Location,
    ) -> Result<Option<Vec<u8>>> {
        self.check_access(AccessOp::FetchCached, loc)?;
        let state = self.state.lock();
        Ok(state.records.get(&loc).map(|r| r.data.clone()))
    }

    fn update(
        &self,
        loc: Location,
        value: Vec<u8>,
    ) -> Result<()> {
        self.check_access(AccessOp::Update, loc)?;
        let mut state = self.state.lock();
        let Some(record) = state.records.get_mut(&loc) else {
            return Err(self.slot_not_found(loc).into());
        };
        record.data = value;
        record.version += 1;
        trace!("{}: update {} to v{}", self.name, loc, record.version);
        Ok(())
    }

    fn free(
        &self,
        loc: Location,
    ) -> Result<()> {
        self.check_access(AccessOp::Free, loc)?;
        let mut state = self.state.lock();
        if state.records.remove(&loc).is_none() {
            return Err(self.slot_not_found(loc).into());
        }
        state.free_list.insert(loc);
        trace!("{}: free {}", self.name, loc);
        Ok(())
    }

    fn version(
        &self,
        loc: Location,
    ) -> Result<u64> {
        let state = self.state.lock();
        state
            .records
            .get(&loc)
            .map(|r| r.version)
            .ok_or_else(|| self.slot_not_found(loc).into())
    }

    fn set_root(
        &self,
        index: usize,
        loc: Location,
    ) -> Result<()> {
        Self::check_root_index(index)?;
        self.state.lock().roots[index] = loc;
        Ok(())
    }

    fn root(
        &self,
        index: usize,
    ) -> Result<Location> {
        Self::check_root_index(index)?;
        Ok(self.state.lock().roots[index])
    }

    fn flush(&self) -> Result<()> {
        trace!("MemoryStorageManager flush (no-op)");
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        trace!("MemoryStorageManager rollback (no-op)");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        trace!("MemoryStorageManager close (no-op)");
        Ok(())
    }

    fn dump(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MemoryStorageManager {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let state = self.state.lock();
        writeln!(f, "MemoryStorageManager {}", self.name)?;
        write!(f, "Roots: ")?;
        for (i, root) in state.roots.iter().enumerate() {
            write!(f, "{}={} ", i, root)?;
        }
        writeln!(f)?;
        for (loc, record) in &state.records {
            writeln!(
                f,
                "{} (v:{}) - len: {} - {:?}",
                loc,
                record.version,
                record.data.len(),
                String::from_utf8_lossy(&record.data)
            )?;
        }
        Ok(())
    }
}
