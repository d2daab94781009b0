use bson::{Document, doc};

use super::GridBuilder;
use crate::database::FindQuery;

/// Builds a plain find request.
///
/// Filters are collected AND-wise. Computed fields and unsets have no find equivalent and
/// are dropped with a warning.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    filters: Vec<Document>,
    sort: Option<Document>,
    skip: Option<u64>,
    limit: Option<u64>,
    projection: Option<Document>,
}

impl QueryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a base filter; an empty document adds nothing.
    #[must_use]
    pub fn with_filter(mut self, filter: Document) -> Self {
        self.match_filter(filter);
        self
    }

    #[must_use]
    pub fn with_projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    /// The combined filter: `{}` when empty, the single filter, or `{$and: [...]}`.
    #[must_use]
    pub fn filter(&self) -> Document {
        match self.filters.as_slice() {
            [] => Document::new(),
            [single] => single.clone(),
            many => doc! { "$and": many.to_vec() },
        }
    }

    #[must_use]
    pub fn into_find_query(self) -> FindQuery {
        FindQuery {
            filter: self.filter(),
            sort: self.sort,
            skip: self.skip,
            limit: self.limit,
            projection: self.projection,
        }
    }
}

impl GridBuilder for QueryBuilder {
    fn match_filter(&mut self, filter: Document) {
        if !filter.is_empty() {
            self.filters.push(filter);
        }
    }

    fn add_fields(&mut self, fields: Document) {
        tracing::warn!(?fields, "Computed fields are not supported on a find query, ignoring");
    }

    fn sort(&mut self, keys: Document) {
        let sort = self.sort.get_or_insert_with(Document::new);
        for (key, direction) in keys {
            sort.insert(key, direction);
        }
    }

    fn unset(&mut self, fields: &[String]) {
        tracing::warn!(?fields, "Unset is not supported on a find query, ignoring");
    }

    fn skip(&mut self, count: u64) {
        self.skip = Some(count);
    }

    fn limit(&mut self, count: u64) {
        self.limit = Some(count);
    }
}
