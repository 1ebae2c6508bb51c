use std::collections::HashMap;

use parking_lot::Mutex;

use crate::AccessFaultInjector;
use crate::AccessOp;
use crate::InjectedFault;
use crate::Location;

/// Per-location fault rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    /// Cache-only reads miss
    NotInCache,
    /// Cached and full reads hit a medium conflict
    CacheAndFetchSeriousError,
    /// Full reads report the slot as missing
    FetchError,
    UpdateError,
    FreeError,
    /// Inserting into this location hits a medium conflict
    InsertError,
}

/// Map-based [`AccessFaultInjector`] whose rules can change mid-test.
#[derive(Debug, Default)]
pub struct AccessFaultMap {
    rules: Mutex<HashMap<Location, AccessRule>>,
}

impl AccessFaultMap {
    pub fn set(
        &self,
        loc: Location,
        rule: AccessRule,
    ) {
        self.rules.lock().insert(loc, rule);
    }

    pub fn clear(
        &self,
        loc: Location,
    ) {
        self.rules.lock().remove(&loc);
    }
}

impl AccessFaultInjector for AccessFaultMap {
    fn decide(
        &self,
        op: AccessOp,
        loc: Location,
    ) -> Option<InjectedFault> {
        let rule = *self.rules.lock().get(&loc)?;
        match (rule, op) {
            (AccessRule::NotInCache, AccessOp::FetchCached) => Some(InjectedFault::NotInCache),
            (AccessRule::CacheAndFetchSeriousError, AccessOp::FetchCached | AccessOp::Fetch) => {
                Some(InjectedFault::AccessConflict)
            }
            (AccessRule::FetchError, AccessOp::Fetch) => Some(InjectedFault::SlotNotFound),
            (AccessRule::UpdateError, AccessOp::Update) => Some(InjectedFault::SlotNotFound),
            (AccessRule::FreeError, AccessOp::Free) => Some(InjectedFault::SlotNotFound),
            (AccessRule::InsertError, AccessOp::Insert) => Some(InjectedFault::AccessConflict),
            _ => None,
        }
    }
}
