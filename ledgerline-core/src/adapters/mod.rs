//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for a persisted `SheetStore`
//! - An in-memory `SheetStore` for tests and in-process sorting
//! - CSV reading and writing

pub mod csv;
pub mod duckdb;
pub mod memory;
