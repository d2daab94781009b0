use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bson::Bson;

use super::callbacks::{ConditionCallback, Predicate, SortCallback};
use crate::builder::GridBuilder;
use crate::errors::GridError;
use crate::models::Operator;

/// Per-resource column configuration.
///
/// Maps the logical column names clients send to physical document fields, lists the
/// searchable columns, and holds optional callbacks that replace the generic condition or
/// sort compilation for a column. Built once, then shared read-only:
///
/// ```rust,ignore
/// let columns = ColumnConfig::new("DocumentFilter")
///     .condition("id", "_id")
///     .condition("string", "string")
///     .sortation("string", "string")
///     .searchable("string")
///     .sort_callback("custom_string", |builder| {
///         builder.add_fields(doc! { "customString": "$string" });
///         vec!["customString".to_string()]
///     });
/// ```
#[derive(Clone)]
pub struct ColumnConfig {
    resource: String,
    conditions: HashMap<String, String>,
    sortations: HashMap<String, String>,
    searchable: Vec<String>,
    condition_callbacks: HashMap<String, ConditionCallback>,
    sort_callbacks: HashMap<String, SortCallback>,
}

impl ColumnConfig {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            conditions: HashMap::new(),
            sortations: HashMap::new(),
            searchable: Vec::new(),
            condition_callbacks: HashMap::new(),
            sort_callbacks: HashMap::new(),
        }
    }

    #[must_use]
    pub fn condition(mut self, logical: impl Into<String>, physical: impl Into<String>) -> Self {
        self.conditions.insert(logical.into(), physical.into());
        self
    }

    #[must_use]
    pub fn sortation(mut self, logical: impl Into<String>, physical: impl Into<String>) -> Self {
        self.sortations.insert(logical.into(), physical.into());
        self
    }

    /// Mark a logical column as searchable; it must also be a condition column.
    #[must_use]
    pub fn searchable(mut self, logical: impl Into<String>) -> Self {
        let logical = logical.into();
        if !self.searchable.contains(&logical) {
            self.searchable.push(logical);
        }
        self
    }

    #[must_use]
    pub fn condition_callback<F>(mut self, logical: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut dyn GridBuilder, &[Bson], &str, &mut Predicate, Option<&Operator>)
            + Send
            + Sync
            + 'static,
    {
        self.condition_callbacks
            .insert(logical.into(), Arc::new(callback));
        self
    }

    #[must_use]
    pub fn sort_callback<F>(mut self, logical: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut dyn GridBuilder) -> Vec<String> + Send + Sync + 'static,
    {
        self.sort_callbacks.insert(logical.into(), Arc::new(callback));
        self
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Physical field for a filterable logical column.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::MissingConditionColumn`] for an unknown column.
    pub fn resolve_condition(&self, column: &str) -> Result<&str, GridError> {
        self.conditions
            .get(column)
            .map(String::as_str)
            .ok_or_else(|| GridError::missing_condition_column(column, &self.resource))
    }

    /// Physical field for a sortable logical column.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::MissingSortationColumn`] for an unknown column.
    pub fn resolve_sortation(&self, column: &str) -> Result<&str, GridError> {
        self.sortations
            .get(column)
            .map(String::as_str)
            .ok_or_else(|| GridError::missing_sortation_column(column, &self.resource))
    }

    /// Searchable columns as `(logical, physical)` pairs, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::MissingSearchColumn`] when nothing is searchable or a
    /// searchable column is not a condition column.
    pub fn require_searchable(&self) -> Result<Vec<(&str, &str)>, GridError> {
        if self.searchable.is_empty() {
            return Err(GridError::missing_search_column(None, &self.resource));
        }

        self.searchable
            .iter()
            .map(|logical| {
                self.conditions
                    .get(logical)
                    .map(|physical| (logical.as_str(), physical.as_str()))
                    .ok_or_else(|| GridError::missing_search_column(Some(logical), &self.resource))
            })
            .collect()
    }

    #[must_use]
    pub fn condition_callback_for(&self, column: &str) -> Option<&ConditionCallback> {
        self.condition_callbacks.get(column)
    }

    #[must_use]
    pub fn sort_callback_for(&self, column: &str) -> Option<&SortCallback> {
        self.sort_callbacks.get(column)
    }
}

impl fmt::Debug for ColumnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnConfig")
            .field("resource", &self.resource)
            .field("conditions", &self.conditions)
            .field("sortations", &self.sortations)
            .field("searchable", &self.searchable)
            .field(
                "condition_callbacks",
                &self.condition_callbacks.keys().collect::<Vec<_>>(),
            )
            .field(
                "sort_callbacks",
                &self.sort_callbacks.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
