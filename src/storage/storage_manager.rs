use std::fmt::Debug;

use crate::Result;

/// Slot identifier within one store. 0 is reserved and never live.
pub type Location = u64;

/// Number of root slots of every store
pub const ROOT_COUNT: usize = 10;

pub trait StorageManager: Send + Sync + 'static {
    fn name(&self) -> String;

    /// Stores `value` at the lowest free location, or at the next unused one
    /// when nothing has been freed.
    fn insert(
        &self,
        value: Vec<u8>,
    ) -> Result<Location>;

    fn fetch(
        &self,
        loc: Location,
    ) -> Result<Vec<u8>>;

    /// Cache-only read. A location without a live record yields `None`.
    fn fetch_cached(
        &self,
        loc: Location,
    ) -> Result<Option<Vec<u8>>>;

    fn update(
        &self,
        loc: Location,
        value: Vec<u8>,
    ) -> Result<()>;

    fn free(
        &self,
        loc: Location,
    ) -> Result<()>;

    /// Version of the live record at `loc`; 1 after insert, +1 per update.
    fn version(
        &self,
        loc: Location,
    ) -> Result<u64>;

    fn set_root(
        &self,
        index: usize,
        loc: Location,
    ) -> Result<()>;

    fn root(
        &self,
        index: usize,
    ) -> Result<Location>;

    fn flush(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    fn close(&self) -> Result<()>;

    /// Deterministic listing of roots and live records
    fn dump(&self) -> String;
}

/// Operation seen by an [`AccessFaultInjector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessOp {
    Insert,
    Fetch,
    FetchCached,
    Update,
    Free,
}

/// Fault an injector can force on a storage access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    /// Cache layer reports a miss
    NotInCache,
    /// Location behaves as if it never existed
    SlotNotFound,
    /// Backing medium reports a concurrent-access conflict
    AccessConflict,
}

/// Decides whether an access to a location fails, used to simulate faults
/// of the backing medium.
pub trait AccessFaultInjector: Send + Sync + Debug + 'static {
    fn decide(
        &self,
        op: AccessOp,
        loc: Location,
    ) -> Option<InjectedFault>;
}
