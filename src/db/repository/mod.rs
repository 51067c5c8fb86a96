//! Repository layer: entity-scoped database operations.
//!
//! Every function takes an explicit connection. Multi-row writes open
//! their own transaction; the `pub(crate)` row helpers expect the caller
//! to hold one.

mod filter;
mod procedure;

pub use filter::*;
pub use procedure::*;

pub(crate) use filter::{insert_condition_rows, insert_filter_row};
