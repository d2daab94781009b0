use bson::{Bson, Document, doc};

use super::callbacks::Predicate;
use super::columns::ColumnConfig;
use super::conditions::{LikeMode, build_like_condition};
use crate::builder::GridBuilder;
use crate::errors::GridError;

/// Build the OR group matching `term` against every searchable column.
///
/// Columns with a condition callback delegate to it with `[term]` and no operator; the
/// rest get a case-insensitive substring match.
///
/// # Errors
///
/// Returns [`GridError::MissingSearchColumn`] when the resource has no searchable columns
/// or one of them is not a condition column.
pub fn compile_search(
    columns: &ColumnConfig,
    term: &str,
    builder: &mut dyn GridBuilder,
) -> Result<Document, GridError> {
    let value = Bson::String(term.to_string());
    let mut branches = Vec::new();

    for (logical, physical) in columns.require_searchable()? {
        let branch = match columns.condition_callback_for(logical) {
            Some(callback) => {
                let mut predicate = Predicate::new();
                callback(
                    &mut *builder,
                    std::slice::from_ref(&value),
                    physical,
                    &mut predicate,
                    None,
                );
                predicate.into_document().unwrap_or_default()
            }
            None => build_like_condition(physical, &value, LikeMode::Contains),
        };
        branches.push(branch);
    }

    Ok(doc! { "$or": branches })
}

/// The `$text` clause used by resources backed by a text index.
#[must_use]
pub fn text_search_clause(term: &str) -> Document {
    doc! { "$text": { "$search": term } }
}
