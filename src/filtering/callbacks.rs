use std::sync::Arc;

use bson::{Bson, Document, doc};

use crate::builder::GridBuilder;
use crate::models::Operator;

/// Replaces the generic condition compiler for one logical column.
///
/// Arguments: the builder, the normalised values, the physical field, the predicate sink,
/// and the operator (`None` when invoked for search).
pub type ConditionCallback =
    Arc<dyn Fn(&mut dyn GridBuilder, &[Bson], &str, &mut Predicate, Option<&Operator>) + Send + Sync>;

/// Runs before sorting by a logical column; returns the computed fields it added so they
/// can be removed again after the sort.
pub type SortCallback = Arc<dyn Fn(&mut dyn GridBuilder) -> Vec<String> + Send + Sync>;

/// Sink a condition callback writes its clauses into. Clauses are AND-ed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<Document>,
}

impl Predicate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw filter document.
    pub fn add(&mut self, clause: Document) -> &mut Self {
        self.clauses.push(clause);
        self
    }

    /// Start a clause on `name`.
    pub fn field(&mut self, name: impl Into<String>) -> FieldPredicate<'_> {
        FieldPredicate {
            predicate: self,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `None` when nothing was written, the single clause, or `{$and: [...]}`.
    #[must_use]
    pub fn into_document(self) -> Option<Document> {
        let mut clauses = self.clauses;
        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(doc! { "$and": clauses }),
        }
    }
}

/// Fluent comparison on a single field, see [`Predicate::field`].
pub struct FieldPredicate<'a> {
    predicate: &'a mut Predicate,
    name: String,
}

impl FieldPredicate<'_> {
    fn push(self, operator: &str, value: Bson) {
        let clause = doc! { self.name: { operator: value } };
        self.predicate.add(clause);
    }

    pub fn eq(self, value: impl Into<Bson>) {
        self.push("$eq", value.into());
    }

    pub fn ne(self, value: impl Into<Bson>) {
        self.push("$ne", value.into());
    }

    pub fn in_values(self, values: &[Bson]) {
        self.push("$in", Bson::Array(values.to_vec()));
    }

    pub fn not_in(self, values: &[Bson]) {
        self.push("$nin", Bson::Array(values.to_vec()));
    }

    pub fn gt(self, value: impl Into<Bson>) {
        self.push("$gt", value.into());
    }

    pub fn gte(self, value: impl Into<Bson>) {
        self.push("$gte", value.into());
    }

    pub fn lt(self, value: impl Into<Bson>) {
        self.push("$lt", value.into());
    }

    pub fn lte(self, value: impl Into<Bson>) {
        self.push("$lte", value.into());
    }

    pub fn exists(self, exists: bool) {
        self.push("$exists", Bson::Boolean(exists));
    }

    /// Case-insensitive regular expression match.
    pub fn regex(self, pattern: impl Into<String>) {
        let clause = doc! { self.name: { "$regex": pattern.into(), "$options": "i" } };
        self.predicate.add(clause);
    }
}
