#![deny(unsafe_code)]
//! Time-windowed aggregation of admin-keyed rows.
//!
//! A [`RowSchema`] describes one dataset: which columns carry the admin
//! chain, how dates are read, and which indicator groups to emit. The
//! [`RowAggregator`] folds a row stream through an
//! [`AdminResolver`](hdx_match::AdminResolver) into per-group maps keyed by
//! admin code, keeping only the latest-dated values unless told otherwise.

pub mod aggregator;
pub mod dates;
pub mod expr;
pub mod flatten;
pub mod frame;
pub mod reducer;
pub mod schema;

pub use aggregator::{
    AggregateOutput, AggregateStats, GLOBAL_KEY, GroupOutput, OutputValue, RowAggregator,
};
pub use dates::parse_date;
pub use expr::{ExprError, Expression};
pub use flatten::Flatten;
pub use frame::{cell_from_any, read_csv_frame, rows_from_frame};
pub use reducer::{CompiledReducer, REDUCER_VARIABLES, Reducer};
pub use schema::{DateKind, FilterSpec, FlattenRule, IndicatorGroup, RowSchema, ValueSource};
