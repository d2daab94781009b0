use bson::{Bson, Document, doc};

use super::callbacks::Predicate;
use super::columns::ColumnConfig;
use super::conditions::compile_condition;
use super::search::{compile_search, text_search_clause};
use super::sort::compile_sortations;
use super::values::normalize;
use crate::builder::GridBuilder;
use crate::errors::GridError;
use crate::models::{Condition, FilterGroup, GridRequest};

/// Compiles one [`GridRequest`] against a resource's [`ColumnConfig`].
///
/// The same steps drive both assemblers: the caller picks the [`GridBuilder`] and the
/// compiler only emits `match_filter`, `sort`, `unset`, `skip` and `limit` calls.
#[derive(Debug, Clone, Copy)]
pub struct GridCompiler<'a> {
    columns: &'a ColumnConfig,
    request: &'a GridRequest,
    text_search: bool,
}

impl<'a> GridCompiler<'a> {
    #[must_use]
    pub const fn new(columns: &'a ColumnConfig, request: &'a GridRequest) -> Self {
        Self {
            columns,
            request,
            text_search: false,
        }
    }

    /// Also require a `$text` match for the search term.
    #[must_use]
    pub const fn with_text_search(mut self, enabled: bool) -> Self {
        self.text_search = enabled;
        self
    }

    #[must_use]
    pub const fn columns(&self) -> &'a ColumnConfig {
        self.columns
    }

    #[must_use]
    pub const fn request(&self) -> &'a GridRequest {
        self.request
    }

    /// Emit the combined filter and search match, if there is anything to match.
    ///
    /// Each non-empty OR group of the primary filter, then of the additional filters,
    /// becomes one `$or`; the search group follows. All groups are AND-ed in a single
    /// `match_filter` call.
    ///
    /// # Errors
    ///
    /// Fails on incomplete conditions, unknown columns, or search without searchable
    /// columns.
    pub fn add_conditions(&self, builder: &mut dyn GridBuilder) -> Result<(), GridError> {
        let mut groups = Vec::new();

        self.compile_groups(&self.request.filter, builder, &mut groups)?;
        self.compile_groups(&self.request.additional_filters, builder, &mut groups)?;

        if let Some(term) = self.request.search_term() {
            groups.push(compile_search(self.columns, term, builder)?);

            if self.text_search {
                groups.push(text_search_clause(term));
            }
        }

        if groups.is_empty() {
            return Ok(());
        }

        let filter = doc! { "$and": groups };
        tracing::debug!(resource = %self.columns.resource(), %filter, "Compiled grid filter");
        builder.match_filter(filter);

        Ok(())
    }

    /// Emit the sort, then remove computed sort fields.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::MissingSortationColumn`] for an unknown column.
    pub fn add_sortations(&self, builder: &mut dyn GridBuilder) -> Result<(), GridError> {
        let plan = compile_sortations(self.columns, &self.request.order_by, builder)?;

        if plan.is_empty() {
            return Ok(());
        }

        builder.sort(plan.keys);

        if !plan.unset.is_empty() {
            builder.unset(&plan.unset);
        }

        Ok(())
    }

    /// Emit the window for the requested page.
    pub fn add_pagination(&self, builder: &mut dyn GridBuilder) {
        builder.skip(self.request.offset());
        builder.limit(self.request.items_per_page());
    }

    /// Conditions, sortations and pagination, in that order.
    ///
    /// # Errors
    ///
    /// See [`Self::add_conditions`] and [`Self::add_sortations`].
    pub fn apply(&self, builder: &mut dyn GridBuilder) -> Result<(), GridError> {
        self.add_conditions(builder)?;
        self.add_sortations(builder)?;
        self.add_pagination(builder);
        Ok(())
    }

    fn compile_groups(
        &self,
        filter: &FilterGroup,
        builder: &mut dyn GridBuilder,
        groups: &mut Vec<Document>,
    ) -> Result<(), GridError> {
        for or_group in filter {
            let branches = or_group
                .iter()
                .map(|condition| self.compile_one(condition, builder))
                .collect::<Result<Vec<_>, _>>()?;

            if !branches.is_empty() {
                groups.push(doc! { "$or": branches });
            }
        }

        Ok(())
    }

    fn compile_one(
        &self,
        condition: &Condition,
        builder: &mut dyn GridBuilder,
    ) -> Result<Document, GridError> {
        let (Some(column), Some(operator)) = (&condition.column, &condition.operator) else {
            return Err(GridError::MissingAdvancedFilterRequiredField);
        };

        let value = match &condition.value {
            Some(value) => value.clone(),
            None if operator.requires_value() => {
                return Err(GridError::MissingAdvancedFilterRequiredField);
            }
            None => Bson::String(String::new()),
        };

        let field = self.columns.resolve_condition(column)?;
        let values = normalize(value);

        if let Some(callback) = self.columns.condition_callback_for(column) {
            let mut predicate = Predicate::new();
            callback(&mut *builder, &values, field, &mut predicate, Some(operator));
            return Ok(predicate.into_document().unwrap_or_default());
        }

        Ok(compile_condition(field, Some(operator), &values))
    }
}
