//! Dynamic filter engine: field catalog, predicate compiler, formatter.
//!
//! A filter is a flat conjunction of typed conditions over procedure
//! fields. Conditions are validated against the [`FieldRegistry`],
//! compiled to an SQL predicate on demand, and rendered for display
//! through a [`LabelLookup`].

pub mod compiler;
pub mod format;
pub mod overview;
pub mod registry;

pub use compiler::{compile, compile_conditions, Clause, Predicate};
pub use format::{ConditionFormatter, LabelCatalog, LabelLookup, LabelNamespace, RawLabels};
pub use overview::{filter_overviews, FilterOverview};
pub use registry::{FieldDescriptor, FieldRegistry, FieldSource, VirtualField, PROCEDURE_FIELDS};
