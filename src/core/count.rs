use bson::{Bson, Document};

/// How the total of an aggregation resource is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountStrategy {
    /// Native collection count with an empty filter.
    Fast,
    /// Run the count pipeline with a trailing `$count` stage.
    Aggregate,
}

/// Name of the field produced by the `$count` stage.
pub const COUNT_FIELD: &str = "count";

/// Pick the count strategy for a data pipeline.
///
/// The native count is only correct when nothing narrows or regroups the collection:
/// no filter condition, no search, and no `$group` key anywhere in the stages.
#[must_use]
pub fn decide(stages: &[Document], has_filter: bool, has_search: bool) -> CountStrategy {
    if has_filter || has_search || stages.iter().any(contains_group) {
        CountStrategy::Aggregate
    } else {
        CountStrategy::Fast
    }
}

fn contains_group(document: &Document) -> bool {
    document
        .iter()
        .any(|(key, value)| key == "$group" || value_contains_group(value))
}

fn value_contains_group(value: &Bson) -> bool {
    match value {
        Bson::Document(document) => contains_group(document),
        Bson::Array(items) => items.iter().any(value_contains_group),
        _ => false,
    }
}

/// Read the total from the rows returned by a `$count` pipeline; no row means zero.
#[must_use]
pub fn read_count(rows: &[Document]) -> u64 {
    let Some(value) = rows.first().and_then(|row| row.get(COUNT_FIELD)) else {
        return 0;
    };

    match value {
        Bson::Int32(count) => u64::try_from(*count).unwrap_or(0),
        Bson::Int64(count) => u64::try_from(*count).unwrap_or(0),
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Bson::Double(count) if *count > 0.0 => *count as u64,
        _ => 0,
    }
}
