//! Quarry Store: entity repository adapters.
//!
//! `memory` keeps rows in a mutex-guarded map for single-process use and
//! tests; `postgres` persists them in a single `entities` table.

pub mod memory;
pub mod postgres;
pub mod schema;
