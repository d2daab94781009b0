use async_trait::async_trait;
use bson::{Document, doc};

use super::count::{COUNT_FIELD, CountStrategy, decide, read_count};
use crate::builder::{GridBuilder, PipelineBuilder, QueryBuilder};
use crate::database::DocumentStore;
use crate::errors::GridError;
use crate::filtering::{ColumnConfig, GridCompiler};
use crate::models::{GridRequest, GridResponse, ResultPage};
use crate::result::{DATE_TIME_UTC, shape_documents};

/// A grid resource answered with a plain find query and a native count.
///
/// ```rust,ignore
/// struct DocumentFilter {
///     columns: ColumnConfig,
/// }
///
/// impl GridFilter for DocumentFilter {
///     const COLLECTION: &'static str = "documents";
///     const USE_TEXT_SEARCH: bool = true;
///
///     fn columns(&self) -> &ColumnConfig {
///         &self.columns
///     }
///
///     fn prepare_query(&self) -> QueryBuilder {
///         QueryBuilder::new().with_filter(doc! { "deleted": false })
///     }
/// }
/// ```
#[async_trait]
pub trait GridFilter: Send + Sync {
    const COLLECTION: &'static str;
    /// chrono format string for date fields in the output.
    const DATE_FORMAT: &'static str = DATE_TIME_UTC;
    /// Honour `nativeQuery` from the request.
    const ALLOW_NATIVE: bool = false;
    /// Also require a `$text` match when searching; needs a text index.
    const USE_TEXT_SEARCH: bool = false;

    fn columns(&self) -> &ColumnConfig;

    /// Base query the request is compiled into.
    fn prepare_query(&self) -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Separate base query for counting. When `None`, the data query's filter is reused.
    fn custom_count_query(&self) -> Option<QueryBuilder> {
        None
    }

    /// Fetch one page of shaped documents and the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed requests, and store errors from either
    /// round trip. A store "index not found" error becomes
    /// [`GridError::MissingSearchIndex`].
    async fn get_data<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        request: &GridRequest,
    ) -> Result<ResultPage, GridError> {
        let columns = self.columns();
        let compiler = GridCompiler::new(columns, request).with_text_search(Self::USE_TEXT_SEARCH);
        let native = request.native_query.as_ref().filter(|_| Self::ALLOW_NATIVE);

        let mut query = self.prepare_query();
        if let Some(native) = native {
            query.match_filter(native.clone());
        }
        compiler.add_sortations(&mut query)?;
        compiler.add_conditions(&mut query)?;

        let count_query = match self.custom_count_query() {
            Some(mut count_query) => {
                if let Some(native) = native {
                    count_query.match_filter(native.clone());
                }
                compiler.add_conditions(&mut count_query)?;
                count_query
            }
            None => query.clone(),
        };

        compiler.add_pagination(&mut query);
        let find = query.into_find_query();
        tracing::debug!(collection = Self::COLLECTION, filter = %find.filter, "Running grid find query");

        let documents = store
            .find(Self::COLLECTION, &find)
            .await
            .map_err(|err| GridError::from_store(err, columns.resource()))?;
        let items = shape_documents(documents, Self::DATE_FORMAT)?;

        let total = store
            .count(Self::COLLECTION, &count_query.filter())
            .await
            .map_err(|err| GridError::from_store(err, columns.resource()))?;

        Ok(ResultPage { items, total })
    }

    /// [`Self::get_data`] wrapped into the response envelope.
    ///
    /// # Errors
    ///
    /// See [`Self::get_data`].
    async fn get_grid_response<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        request: &GridRequest,
    ) -> Result<GridResponse, GridError> {
        let page = self.get_data(store, request).await?;
        Ok(GridResponse::new(Self::COLLECTION, request, page))
    }
}

/// A grid resource answered with an aggregation pipeline.
///
/// Override [`configure_pipeline`](Self::configure_pipeline) to add lookups or groups
/// around the compiled stages:
///
/// ```rust,ignore
/// fn configure_pipeline(
///     &self,
///     builder: &mut PipelineBuilder,
///     compiler: &GridCompiler<'_>,
/// ) -> Result<(), GridError> {
///     builder.add_stage(doc! { "$lookup": { "from": "authors", "localField": "author", "foreignField": "_id", "as": "author" } });
///     compiler.apply(builder)
/// }
/// ```
#[async_trait]
pub trait AggregationFilter: Send + Sync {
    const COLLECTION: &'static str;
    /// chrono format string for date fields in the output.
    const DATE_FORMAT: &'static str = DATE_TIME_UTC;

    fn columns(&self) -> &ColumnConfig;

    /// Build the data pipeline. Defaults to conditions, sortations and pagination.
    ///
    /// # Errors
    ///
    /// Propagates compilation errors.
    fn configure_pipeline(
        &self,
        builder: &mut PipelineBuilder,
        compiler: &GridCompiler<'_>,
    ) -> Result<(), GridError> {
        compiler.apply(builder)
    }

    /// Build the pipeline the total is counted over. Defaults to conditions only.
    ///
    /// # Errors
    ///
    /// Propagates compilation errors.
    fn configure_count_pipeline(
        &self,
        builder: &mut PipelineBuilder,
        compiler: &GridCompiler<'_>,
    ) -> Result<(), GridError> {
        compiler.add_conditions(builder)
    }

    /// Fetch one page of shaped documents and the total number of matches.
    ///
    /// The total comes from a native count when the request has no filter or search and
    /// the data pipeline contains no `$group`; otherwise the count pipeline is executed
    /// with a trailing `$count` stage.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed requests, and store errors from either
    /// round trip.
    async fn get_data<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        request: &GridRequest,
    ) -> Result<ResultPage, GridError> {
        let columns = self.columns();
        let compiler = GridCompiler::new(columns, request);

        let mut pipeline = PipelineBuilder::new();
        self.configure_pipeline(&mut pipeline, &compiler)?;
        let mut count_pipeline = PipelineBuilder::new();
        self.configure_count_pipeline(&mut count_pipeline, &compiler)?;

        let stages = pipeline.into_stages();
        tracing::debug!(collection = Self::COLLECTION, stages = ?stages, "Running grid pipeline");

        let documents = store
            .aggregate(Self::COLLECTION, &stages)
            .await
            .map_err(|err| GridError::from_store(err, columns.resource()))?;
        let items = shape_documents(documents, Self::DATE_FORMAT)?;

        let strategy = decide(&stages, request.has_filter(), request.has_search());
        tracing::debug!(collection = Self::COLLECTION, ?strategy, "Counting grid results");

        let total = match strategy {
            CountStrategy::Fast => store.count(Self::COLLECTION, &Document::new()).await,
            CountStrategy::Aggregate => {
                count_pipeline.add_stage(doc! { "$count": COUNT_FIELD });
                store
                    .aggregate(Self::COLLECTION, count_pipeline.stages())
                    .await
                    .map(|rows| read_count(&rows))
            }
        }
        .map_err(|err| GridError::from_store(err, columns.resource()))?;

        Ok(ResultPage { items, total })
    }

    /// [`Self::get_data`] wrapped into the response envelope.
    ///
    /// # Errors
    ///
    /// See [`Self::get_data`].
    async fn get_grid_response<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        request: &GridRequest,
    ) -> Result<GridResponse, GridError> {
        let page = self.get_data(store, request).await?;
        Ok(GridResponse::new(Self::COLLECTION, request, page))
    }
}
