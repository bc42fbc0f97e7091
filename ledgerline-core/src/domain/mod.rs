//! Core domain types
//!
//! Pure data structures shared by the engine, the ports and the adapters.
//! No I/O happens here.

mod batch;
mod context;
pub mod rect;
pub mod result;
mod schema;
pub mod validation;
pub mod value;

pub use batch::{Batch, SparseRow};
pub use context::ImportContext;
pub use rect::{Rect, HEADER_ROWS};
pub use schema::{fields, FieldSchema, StoreSchema};
pub use validation::ValidationRule;
pub use value::Value;
