use bson::{Bson, Document, doc};

use crate::models::Operator;

/// Textual form of a value used inside a regular expression.
fn value_text(value: &Bson) -> String {
    match value {
        Bson::String(text) => text.clone(),
        Bson::Null => String::new(),
        Bson::Int32(number) => number.to_string(),
        Bson::Int64(number) => number.to_string(),
        Bson::Double(number) => number.to_string(),
        Bson::Boolean(flag) => flag.to_string(),
        other => other.to_string(),
    }
}

/// Pattern kinds for [`build_like_condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeMode {
    Contains,
    StartsWith,
    EndsWith,
}

/// Case-insensitive match of `value` as a literal substring, prefix or suffix.
#[must_use]
pub fn build_like_condition(field: &str, value: &Bson, mode: LikeMode) -> Document {
    let escaped = regex::escape(&value_text(value));
    let pattern = match mode {
        LikeMode::Contains => escaped,
        LikeMode::StartsWith => format!("^{escaped}"),
        LikeMode::EndsWith => format!("{escaped}$"),
    };

    doc! { field: { "$regex": pattern, "$options": "i" } }
}

fn compare(field: &str, operator: &str, value: Bson) -> Document {
    doc! { field: { operator: value } }
}

/// Compile one condition into a filter document.
///
/// `values` are already normalised. Single-value operators use the first value (`null`
/// when the list is empty). `EQ`/`IN` and `NEQ`/`NIN` pick the list or scalar form by
/// cardinality; `BETWEEN`/`NBETWEEN` with fewer than two values fall back to equality or
/// inequality. Unknown operators compile as equality.
#[must_use]
pub fn compile_condition(field: &str, operator: Option<&Operator>, values: &[Bson]) -> Document {
    let first = values.first().cloned().unwrap_or(Bson::Null);
    let multi = values.len() > 1;

    let Some(operator) = operator else {
        return compare(field, "$eq", first);
    };

    match operator {
        Operator::Eq | Operator::In if multi => compare(field, "$in", Bson::Array(values.to_vec())),
        Operator::Neq | Operator::Nin if multi => {
            compare(field, "$nin", Bson::Array(values.to_vec()))
        }
        Operator::Neq | Operator::Nin => compare(field, "$ne", first),
        Operator::Gt => compare(field, "$gt", first),
        Operator::Gte => compare(field, "$gte", first),
        Operator::Lt => compare(field, "$lt", first),
        Operator::Lte => compare(field, "$lte", first),
        Operator::NotEmpty => doc! {
            "$and": [
                { field: { "$ne": Bson::Null } },
                { field: { "$ne": first } },
            ]
        },
        Operator::Empty => doc! {
            "$or": [
                { field: { "$eq": Bson::Null } },
                { field: { "$eq": first } },
            ]
        },
        Operator::Like => build_like_condition(field, &first, LikeMode::Contains),
        Operator::Starts => build_like_condition(field, &first, LikeMode::StartsWith),
        Operator::Ends => build_like_condition(field, &first, LikeMode::EndsWith),
        Operator::Between => match values {
            [low, high, ..] => doc! { field: { "$gte": low.clone(), "$lte": high.clone() } },
            _ => compare(field, "$eq", first),
        },
        Operator::NotBetween => match values {
            [low, high, ..] => doc! {
                "$or": [
                    { field: { "$lte": low.clone() } },
                    { field: { "$gte": high.clone() } },
                ]
            },
            _ => compare(field, "$ne", first),
        },
        Operator::Exist => compare(field, "$exists", Bson::Boolean(true)),
        Operator::NotExist => compare(field, "$exists", Bson::Boolean(false)),
        Operator::Eq | Operator::In | Operator::Other(_) => compare(field, "$eq", first),
    }
}
