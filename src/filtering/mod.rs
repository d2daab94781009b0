//! # Grid Filtering, Sorting & Search
//!
//! This module turns a structured [`GridRequest`](crate::models::GridRequest) into filter
//! documents, sort keys and a paging window for a MongoDB-style document store.
//!
//! ## Main Components
//!
//! - **[`ColumnConfig`]**: logical column names, their physical fields, searchable
//!   columns, and per-column callbacks
//! - **[`normalize`]**: value lists and date-time coercion
//! - **[`compile_condition`]**: the operator table
//! - **[`compile_sortations`]** / **[`compile_search`]**: sort keys and the search group
//! - **[`GridCompiler`]**: drives a [`GridBuilder`](crate::builder::GridBuilder) through
//!   conditions, sortations and pagination
//! - **[`Paging`]** / **[`calculate_content_range`]**: response paging metadata
//!
//! ## Request Examples
//!
//! ```json
//! {
//!   "filter": [
//!     [{"column": "int", "operator": "BETWEEN", "value": [2, 4]}],
//!     [{"column": "string", "operator": "STARTS", "value": "String"},
//!      {"column": "date", "operator": "GTE", "value": "2024-01-03 00:00:00"}]
//!   ],
//!   "sorter": [{"column": "int", "direction": "DESC"}],
//!   "search": "String 3",
//!   "page": 1,
//!   "itemsPerPage": 10
//! }
//! ```
//!
//! ## Operators
//!
//! | Operator | Compiles to |
//! |---|---|
//! | `EQ` / `IN` | `$eq` for one value, `$in` for several |
//! | `NEQ` / `NIN` | `$ne` for one value, `$nin` for several |
//! | `GT`, `GTE`, `LT`, `LTE` | comparison with the first value |
//! | `LIKE`, `STARTS`, `ENDS` | case-insensitive `$regex` on the literal text |
//! | `EMPTY` / `NEMPTY` | equal / not equal to `null` and the given value |
//! | `BETWEEN` / `NBETWEEN` | inclusive range / outside the range |
//! | `EXIST` / `NEXIST` | `$exists` |

pub mod callbacks;
pub mod columns;
pub mod compiler;
pub mod conditions;
pub mod pagination;
pub mod search;
pub mod sort;
pub mod values;

// Re-export commonly used items
pub use callbacks::{ConditionCallback, FieldPredicate, Predicate, SortCallback};
pub use columns::ColumnConfig;
pub use compiler::GridCompiler;
pub use conditions::{LikeMode, build_like_condition, compile_condition};
pub use pagination::{Paging, calculate_content_range};
pub use search::{compile_search, text_search_clause};
pub use sort::{SortPlan, compile_sortations};
pub use values::{normalize, parse_date_time};
