//! Filter evaluation for the in-memory store
//!
//! Supports the query operators the grid compiler emits plus the usual companions:
//! `$and`, `$or`, `$nor`, `$text`, `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`,
//! `$nin`, `$exists`, `$regex`/`$options` and `$not`. A missing field compares as `null`.
//! Array fields match when the array itself or any element matches.

use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::{Regex, RegexBuilder};

use crate::database::StoreError;

/// Evaluates filter documents against one collection.
pub(crate) struct Matcher<'a> {
    text_fields: Option<&'a [String]>,
}

impl<'a> Matcher<'a> {
    pub(crate) const fn new(text_fields: Option<&'a [String]>) -> Self {
        Self { text_fields }
    }

    /// Checks if a document matches every clause of `filter`
    pub(crate) fn matches(&self, document: &Document, filter: &Document) -> Result<bool, StoreError> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for clause in clauses(key, condition)? {
                        if !self.matches(document, clause)? {
                            all = false;
                            break;
                        }
                    }
                    all
                }
                "$or" => self.any_clause(document, key, condition)?,
                "$nor" => !self.any_clause(document, key, condition)?,
                "$text" => self.matches_text(document, condition)?,
                operator if operator.starts_with('$') => {
                    return Err(StoreError::bad_value(format!(
                        "unknown top level operator: {operator}"
                    )));
                }
                path => matches_field(lookup(document, path), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any_clause(&self, document: &Document, key: &str, condition: &Bson) -> Result<bool, StoreError> {
        for clause in clauses(key, condition)? {
            if self.matches(document, clause)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn matches_text(&self, document: &Document, condition: &Bson) -> Result<bool, StoreError> {
        let Some(fields) = self.text_fields else {
            return Err(StoreError::new(
                Some(StoreError::INDEX_NOT_FOUND),
                "text index required for $text query",
            ));
        };

        let search = match condition {
            Bson::Document(spec) => spec.get_str("$search").ok(),
            _ => None,
        }
        .ok_or_else(|| StoreError::bad_value("$text requires a $search string"))?;

        let terms: Vec<String> = words(search).collect();
        if terms.is_empty() {
            return Ok(false);
        }

        Ok(fields.iter().any(|field| match lookup(document, field) {
            Some(Bson::String(text)) => words(text).any(|word| terms.contains(&word)),
            _ => false,
        }))
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

fn clauses<'d>(key: &str, condition: &'d Bson) -> Result<Vec<&'d Document>, StoreError> {
    let Bson::Array(items) = condition else {
        return Err(StoreError::bad_value(format!("{key} must be an array")));
    };

    items
        .iter()
        .map(|item| {
            item.as_document()
                .ok_or_else(|| StoreError::bad_value(format!("{key} entries must be documents")))
        })
        .collect()
}

/// Resolve a dotted path through nested documents.
pub(crate) fn lookup<'d>(document: &'d Document, path: &str) -> Option<&'d Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;

    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }

    Some(current)
}

fn is_operator_document(condition: &Bson) -> bool {
    matches!(condition, Bson::Document(spec) if spec.keys().next().is_some_and(|key| key.starts_with('$')))
}

fn matches_field(actual: Option<&Bson>, condition: &Bson) -> Result<bool, StoreError> {
    match condition {
        Bson::Document(spec) if is_operator_document(condition) => matches_operators(actual, spec),
        Bson::RegularExpression(regex) => {
            let compiled = build_regex(&regex.pattern, &regex.options)?;
            Ok(any_value(actual, |value| regex_match(&compiled, value)))
        }
        expected => Ok(equals(actual, expected)),
    }
}

fn matches_operators(actual: Option<&Bson>, spec: &Document) -> Result<bool, StoreError> {
    for (operator, operand) in spec {
        let matched = match operator.as_str() {
            "$eq" => equals(actual, operand),
            "$ne" => !equals(actual, operand),
            "$gt" => compares(actual, operand, Ordering::is_gt),
            "$gte" => compares(actual, operand, Ordering::is_ge),
            "$lt" => compares(actual, operand, Ordering::is_lt),
            "$lte" => compares(actual, operand, Ordering::is_le),
            "$in" => in_list(actual, operand, operator)?,
            "$nin" => !in_list(actual, operand, operator)?,
            "$exists" => actual.is_some() == truthy(operand),
            "$regex" => {
                let options = spec.get_str("$options").unwrap_or_default();
                let compiled = match operand {
                    Bson::String(pattern) => build_regex(pattern, options)?,
                    Bson::RegularExpression(regex) => build_regex(&regex.pattern, &regex.options)?,
                    _ => return Err(StoreError::bad_value("$regex has to be a string")),
                };
                any_value(actual, |value| regex_match(&compiled, value))
            }
            "$options" => true,
            "$not" => !matches_field(actual, operand)?,
            other => {
                return Err(StoreError::bad_value(format!("unknown operator: {other}")));
            }
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn build_regex(pattern: &str, options: &str) -> Result<Regex, StoreError> {
    RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'))
        .build()
        .map_err(|err| StoreError::bad_value(format!("invalid regular expression: {err}")))
}

fn regex_match(regex: &Regex, value: &Bson) -> bool {
    matches!(value, Bson::String(text) if regex.is_match(text))
}

/// True when the value satisfies `predicate`; for arrays, when any element does.
fn any_value(actual: Option<&Bson>, predicate: impl Fn(&Bson) -> bool) -> bool {
    match actual {
        Some(Bson::Array(items)) => items.iter().any(predicate),
        Some(value) => predicate(value),
        None => false,
    }
}

fn equals(actual: Option<&Bson>, expected: &Bson) -> bool {
    match actual {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(value, expected),
    }
}

fn in_list(actual: Option<&Bson>, operand: &Bson, operator: &str) -> Result<bool, StoreError> {
    let Bson::Array(candidates) = operand else {
        return Err(StoreError::bad_value(format!("{operator} needs an array")));
    };

    for candidate in candidates {
        let matched = match candidate {
            Bson::RegularExpression(regex) => {
                let compiled = build_regex(&regex.pattern, &regex.options)?;
                any_value(actual, |value| regex_match(&compiled, value))
            }
            other => equals(actual, other),
        };
        if matched {
            return Ok(true);
        }
    }

    Ok(false)
}

fn compares(actual: Option<&Bson>, bound: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let null = Bson::Null;
    any_value(Some(actual.unwrap_or(&null)), |value| {
        compare_same_type(value, bound).is_some_and(accept)
    })
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(number) => *number != 0,
        Bson::Int64(number) => *number != 0,
        Bson::Double(number) => *number != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(number) => Some(f64::from(*number)),
        Bson::Int64(number) => Some(*number as f64),
        Bson::Double(number) => Some(*number),
        _ => None,
    }
}

/// Equality with numeric values compared across BSON number types.
pub(crate) fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering within one canonical type; `None` across types.
fn compare_same_type(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }

    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Rank of a value in the cross-type sort order; a missing field ranks as `null`.
fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null | Bson::Undefined) => 1,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)) => 2,
        Some(Bson::String(_) | Bson::Symbol(_)) => 3,
        Some(Bson::Document(_)) => 4,
        Some(Bson::Array(_)) => 5,
        Some(Bson::Binary(_)) => 6,
        Some(Bson::ObjectId(_)) => 7,
        Some(Bson::Boolean(_)) => 8,
        Some(Bson::DateTime(_)) => 9,
        Some(Bson::Timestamp(_)) => 10,
        Some(Bson::RegularExpression(_)) => 11,
        Some(Bson::MinKey) => 0,
        Some(_) => 12,
    }
}

/// Total order used for sorting, stable across mixed types.
pub(crate) fn sort_order(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Some(x), Some(y)) => compare_same_type(x, y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}
