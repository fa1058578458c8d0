//! Transaction-related types
//!
//! Transaction control itself lives on the `Connection` trait; this module
//! holds the value types it exchanges.

mod savepoint;

pub use savepoint::*;
