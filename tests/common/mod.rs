//! Shared helpers for async-snmp-agent integration tests.

// Not every test file uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

mod fixtures;
mod stream;

pub use fixtures::*;
pub use stream::drain;
