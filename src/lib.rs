//! # gridcrate
//!
//! Filter, sort, search and paginate request compiler for MongoDB-style document stores.
//!
//! A resource declares which logical columns clients may filter, sort and search on
//! ([`ColumnConfig`]); a [`GridRequest`] is compiled against it into either a find query
//! ([`GridFilter`]) or an aggregation pipeline ([`AggregationFilter`]), executed on a
//! [`DocumentStore`], and returned as a [`ResultPage`] or a [`GridResponse`] envelope.
//!
//! ```rust,ignore
//! use gridcrate::{AggregationFilter, ColumnConfig, GridError, GridRequest, GridResponse};
//!
//! struct Documents {
//!     columns: ColumnConfig,
//! }
//!
//! impl AggregationFilter for Documents {
//!     const COLLECTION: &'static str = "documents";
//!
//!     fn columns(&self) -> &ColumnConfig {
//!         &self.columns
//!     }
//! }
//!
//! async fn list(
//!     State(state): State<AppState>,
//!     Json(request): Json<GridRequest>,
//! ) -> Result<GridResponse, GridError> {
//!     state.documents.get_grid_response(&state.store, &request).await
//! }
//! ```

pub mod builder;
pub mod core;
pub mod database;
pub mod errors;
pub mod filtering;
pub mod models;
pub mod result;

pub use builder::{GridBuilder, PipelineBuilder, QueryBuilder};
pub use crate::core::{AggregationFilter, CountStrategy, GridFilter};
pub use database::{DocumentStore, FindQuery, MemoryStore, StoreError};
#[cfg(feature = "mongodb")]
pub use database::MongoStore;
pub use errors::GridError;
pub use filtering::{ColumnConfig, GridCompiler, Paging, Predicate};
pub use models::{
    Condition, Direction, FilterGroup, GridRequest, GridResponse, Operator, ResultPage, Sortation,
};
pub use result::{DATE_TIME, DATE_TIME_UTC};

pub use bson;
