//! Local store backends: SQLite for production, in-memory for tests.

pub mod traits;
pub mod sql;
pub mod memory;
