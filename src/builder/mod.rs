//! # Query Assemblers
//!
//! The compiler never talks to the store directly. It drives a [`GridBuilder`], which
//! records match filters, sort keys and the paging window, and later turns them into
//! something the [`DocumentStore`](crate::database::DocumentStore) can execute:
//!
//! - [`QueryBuilder`] produces a single [`FindQuery`](crate::database::FindQuery) for
//!   resources queried directly.
//! - [`PipelineBuilder`] appends aggregation stages for resources backed by a pipeline.
//!
//! Condition and sort callbacks receive the builder as `&mut dyn GridBuilder`, so a
//! callback can add computed fields before the sort stage is emitted.

pub mod pipeline;
pub mod query;

pub use pipeline::PipelineBuilder;
pub use query::QueryBuilder;

use bson::Document;

pub trait GridBuilder: Send {
    /// AND a filter document into the current match.
    fn match_filter(&mut self, filter: Document);

    /// Add computed fields (an `$addFields` stage in a pipeline).
    fn add_fields(&mut self, fields: Document);

    /// Sort by the given keys; values are `1` or `-1`.
    fn sort(&mut self, keys: Document);

    /// Remove computed fields from the output.
    fn unset(&mut self, fields: &[String]);

    fn skip(&mut self, count: u64);

    fn limit(&mut self, count: u64);
}
