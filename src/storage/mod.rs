//! Local slot storage.
//!
//! A [`StorageManager`] owns one named store: a location allocator with
//! lowest-first reuse, versioned records and a fixed root table. Everything
//! above this layer (replication, routing, repair) lives in `cluster`.

mod memory_storage_manager;
mod storage_manager;


pub use memory_storage_manager::*;
pub use storage_manager::*;
