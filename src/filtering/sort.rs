use bson::Document;

use super::columns::ColumnConfig;
use crate::builder::GridBuilder;
use crate::errors::GridError;
use crate::models::Sortation;

/// Compiled sort: keys in precedence order plus computed fields to drop afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortPlan {
    pub keys: Document,
    pub unset: Vec<String>,
}

impl SortPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Resolve sortations against the column map and run their sort callbacks.
///
/// Keys keep caller order. A column listed twice keeps its first position and takes the
/// last direction.
///
/// # Errors
///
/// Returns [`GridError::MissingSortationColumn`] for an unknown column.
pub fn compile_sortations(
    columns: &ColumnConfig,
    order_by: &[Sortation],
    builder: &mut dyn GridBuilder,
) -> Result<SortPlan, GridError> {
    let mut plan = SortPlan::default();

    for sortation in order_by {
        let field = columns.resolve_sortation(&sortation.column)?;

        if let Some(callback) = columns.sort_callback_for(&sortation.column) {
            plan.unset.extend(callback(&mut *builder));
        }

        plan.keys.insert(field, sortation.direction.as_i32());
    }

    Ok(plan)
}
