//! the test_utils folder here will share utils or test components between
//! unit tests of different modules
mod access_faults;
mod cluster;
mod common;

pub use access_faults::*;
pub use cluster::*;
pub use common::*;
