//! Aggregation stages for the in-memory store
//!
//! Stages run one after another over owned documents. Supported: `$match`, `$sort`,
//! `$skip`, `$limit`, `$addFields`/`$set`, `$unset`, `$project`, `$count`, `$group` and the
//! equality form of `$lookup`.

use std::collections::HashMap;

use bson::{Bson, Document, doc};

use super::Collection;
use super::matcher::{Matcher, lookup, sort_order, values_equal};
use crate::database::StoreError;

/// Server code for an unrecognised pipeline stage.
const UNKNOWN_STAGE: i32 = 40324;

pub(crate) struct Pipeline<'a> {
    collections: &'a HashMap<String, Collection>,
    text_fields: Option<&'a [String]>,
}

impl<'a> Pipeline<'a> {
    pub(crate) const fn new(
        collections: &'a HashMap<String, Collection>,
        text_fields: Option<&'a [String]>,
    ) -> Self {
        Self {
            collections,
            text_fields,
        }
    }

    pub(crate) fn run(
        &self,
        mut documents: Vec<Document>,
        stages: &[Document],
    ) -> Result<Vec<Document>, StoreError> {
        for stage in stages {
            let mut entries = stage.iter();
            let (Some((name, spec)), None) = (entries.next(), entries.next()) else {
                return Err(StoreError::bad_value(
                    "a pipeline stage specification object must contain exactly one field",
                ));
            };

            documents = self.run_stage(documents, name, spec)?;
        }

        Ok(documents)
    }

    fn run_stage(
        &self,
        documents: Vec<Document>,
        name: &str,
        spec: &Bson,
    ) -> Result<Vec<Document>, StoreError> {
        match name {
            "$match" => {
                let filter = stage_document(name, spec)?;
                filter_documents(documents, filter, &Matcher::new(self.text_fields))
            }
            "$sort" => {
                let mut documents = documents;
                sort_documents(&mut documents, stage_document(name, spec)?)?;
                Ok(documents)
            }
            "$skip" => Ok(documents.into_iter().skip(window(name, spec)?).collect()),
            "$limit" => match window(name, spec)? {
                0 => Err(StoreError::bad_value("the limit must be positive")),
                limit => Ok(documents.into_iter().take(limit).collect()),
            },
            "$addFields" | "$set" => add_fields(documents, stage_document(name, spec)?),
            "$unset" => Ok(unset(documents, &unset_paths(spec)?)),
            "$project" => {
                let projection = stage_document(name, spec)?;
                documents
                    .iter()
                    .map(|document| project(document, projection))
                    .collect()
            }
            "$count" => count(&documents, spec),
            "$group" => group(documents, stage_document(name, spec)?),
            "$lookup" => self.lookup(documents, stage_document(name, spec)?),
            other => Err(StoreError::new(
                Some(UNKNOWN_STAGE),
                format!("Unrecognized pipeline stage name: '{other}'"),
            )),
        }
    }

    fn lookup(&self, documents: Vec<Document>, spec: &Document) -> Result<Vec<Document>, StoreError> {
        let field = |key: &str| {
            spec.get_str(key)
                .map_err(|_| StoreError::bad_value(format!("$lookup requires a '{key}' string")))
        };
        let from = field("from")?;
        let local_field = field("localField")?;
        let foreign_field = field("foreignField")?;
        let target = field("as")?;

        let foreign = self
            .collections
            .get(from)
            .map(|collection| collection.documents.as_slice())
            .unwrap_or_default();

        Ok(documents
            .into_iter()
            .map(|mut document| {
                let local = lookup(&document, local_field).cloned().unwrap_or(Bson::Null);
                let joined: Vec<Bson> = foreign
                    .iter()
                    .filter(|candidate| joins(lookup(candidate, foreign_field), &local))
                    .cloned()
                    .map(Bson::Document)
                    .collect();
                set_path(&mut document, target, Bson::Array(joined));
                document
            })
            .collect())
    }
}

fn joins(foreign: Option<&Bson>, local: &Bson) -> bool {
    let foreign = foreign.unwrap_or(&Bson::Null);
    match local {
        Bson::Array(items) => items.iter().any(|item| values_equal(foreign, item)),
        value => values_equal(foreign, value),
    }
}

fn stage_document<'s>(name: &str, spec: &'s Bson) -> Result<&'s Document, StoreError> {
    spec.as_document()
        .ok_or_else(|| StoreError::bad_value(format!("{name} specification must be an object")))
}

fn window(name: &str, spec: &Bson) -> Result<usize, StoreError> {
    let count = match spec {
        Bson::Int32(count) => i64::from(*count),
        Bson::Int64(count) => *count,
        #[allow(clippy::cast_possible_truncation)]
        Bson::Double(count) if count.fract() == 0.0 => *count as i64,
        _ => -1,
    };

    usize::try_from(count)
        .map_err(|_| StoreError::bad_value(format!("{name} must be a non-negative integer")))
}

pub(crate) fn filter_documents(
    documents: Vec<Document>,
    filter: &Document,
    matcher: &Matcher<'_>,
) -> Result<Vec<Document>, StoreError> {
    let mut matched = Vec::with_capacity(documents.len());
    for document in documents {
        if matcher.matches(&document, filter)? {
            matched.push(document);
        }
    }
    Ok(matched)
}

/// Stable multi-key sort; key values must be `1` or `-1`.
pub(crate) fn sort_documents(documents: &mut [Document], keys: &Document) -> Result<(), StoreError> {
    let mut spec = Vec::with_capacity(keys.len());
    for (field, direction) in keys {
        let descending = match direction {
            Bson::Int32(1) | Bson::Int64(1) => false,
            Bson::Int32(-1) | Bson::Int64(-1) => true,
            Bson::Double(value) if *value == 1.0 => false,
            Bson::Double(value) if *value == -1.0 => true,
            _ => return Err(StoreError::bad_value(format!("$sort key '{field}' must be 1 or -1"))),
        };
        spec.push((field.as_str(), descending));
    }

    documents.sort_by(|a, b| {
        spec.iter()
            .map(|(field, descending)| {
                let ordering = sort_order(lookup(a, field), lookup(b, field));
                if *descending { ordering.reverse() } else { ordering }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(())
}

/// Evaluate an aggregation expression; `None` means the value is missing.
fn evaluate(document: &Document, expression: &Bson) -> Result<Option<Bson>, StoreError> {
    match expression {
        Bson::String(reference) if reference.starts_with('$') && !reference.starts_with("$$") => {
            Ok(lookup(document, &reference[1..]).cloned())
        }
        Bson::Document(spec) => match spec.iter().next() {
            Some((operator, argument)) if operator.starts_with('$') => {
                evaluate_operator(document, operator, argument).map(Some)
            }
            _ => {
                let mut evaluated = Document::new();
                for (key, value) in spec {
                    if let Some(value) = evaluate(document, value)? {
                        evaluated.insert(key, value);
                    }
                }
                Ok(Some(Bson::Document(evaluated)))
            }
        },
        Bson::Array(items) => items
            .iter()
            .map(|item| evaluate(document, item).map(|value| value.unwrap_or(Bson::Null)))
            .collect::<Result<Vec<_>, _>>()
            .map(|items| Some(Bson::Array(items))),
        literal => Ok(Some(literal.clone())),
    }
}

fn single_argument(document: &Document, argument: &Bson) -> Result<Bson, StoreError> {
    let argument = match argument {
        Bson::Array(items) => items.first().unwrap_or(&Bson::Null),
        other => other,
    };
    Ok(evaluate(document, argument)?.unwrap_or(Bson::Null))
}

fn text_of(value: &Bson) -> String {
    match value {
        Bson::String(text) => text.clone(),
        Bson::Null | Bson::Undefined => String::new(),
        other => other.to_string(),
    }
}

fn evaluate_operator(document: &Document, operator: &str, argument: &Bson) -> Result<Bson, StoreError> {
    match operator {
        "$literal" => Ok(argument.clone()),
        "$toLower" => Ok(Bson::String(text_of(&single_argument(document, argument)?).to_lowercase())),
        "$toUpper" => Ok(Bson::String(text_of(&single_argument(document, argument)?).to_uppercase())),
        "$ifNull" => {
            let Bson::Array(items) = argument else {
                return Err(StoreError::bad_value("$ifNull needs an array"));
            };
            for item in items {
                match evaluate(document, item)? {
                    None | Some(Bson::Null) => {}
                    Some(value) => return Ok(value),
                }
            }
            Ok(Bson::Null)
        }
        "$concat" => {
            let Bson::Array(items) = argument else {
                return Err(StoreError::bad_value("$concat needs an array"));
            };
            let mut joined = String::new();
            for item in items {
                match evaluate(document, item)? {
                    Some(Bson::String(part)) => joined.push_str(&part),
                    None | Some(Bson::Null) => return Ok(Bson::Null),
                    Some(_) => return Err(StoreError::bad_value("$concat only supports strings")),
                }
            }
            Ok(Bson::String(joined))
        }
        other => Err(StoreError::bad_value(format!(
            "Unrecognized expression '{other}'"
        ))),
    }
}

/// Set a dotted path, creating intermediate documents.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}

fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

fn add_fields(documents: Vec<Document>, spec: &Document) -> Result<Vec<Document>, StoreError> {
    documents
        .into_iter()
        .map(|mut document| {
            for (field, expression) in spec {
                if let Some(value) = evaluate(&document, expression)? {
                    set_path(&mut document, field, value);
                }
            }
            Ok(document)
        })
        .collect()
}

fn unset_paths(spec: &Bson) -> Result<Vec<String>, StoreError> {
    match spec {
        Bson::String(field) => Ok(vec![field.clone()]),
        Bson::Array(fields) => fields
            .iter()
            .map(|field| {
                field
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| StoreError::bad_value("$unset specification must be a string or array of strings"))
            })
            .collect(),
        _ => Err(StoreError::bad_value(
            "$unset specification must be a string or array of strings",
        )),
    }
}

fn unset(documents: Vec<Document>, paths: &[String]) -> Vec<Document> {
    documents
        .into_iter()
        .map(|mut document| {
            for path in paths {
                remove_path(&mut document, path);
            }
            document
        })
        .collect()
}

fn is_exclusion(value: &Bson) -> bool {
    matches!(
        value,
        Bson::Boolean(false) | Bson::Int32(0) | Bson::Int64(0)
    ) || matches!(value, Bson::Double(number) if *number == 0.0)
}

fn is_inclusion(value: &Bson) -> bool {
    matches!(value, Bson::Boolean(true) | Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
        && !is_exclusion(value)
}

/// Apply an inclusion or exclusion projection. `_id` is kept unless excluded.
pub(crate) fn project(document: &Document, projection: &Document) -> Result<Document, StoreError> {
    let inclusion = projection
        .iter()
        .any(|(field, value)| field != "_id" && !is_exclusion(value));

    if !inclusion {
        let mut projected = document.clone();
        for (field, _) in projection {
            remove_path(&mut projected, field);
        }
        return Ok(projected);
    }

    let mut projected = Document::new();
    if !projection.get("_id").is_some_and(is_exclusion) {
        if let Some(id) = document.get("_id") {
            projected.insert("_id", id.clone());
        }
    }

    for (field, value) in projection {
        if field == "_id" {
            continue;
        }
        if is_exclusion(value) {
            return Err(StoreError::bad_value(format!(
                "Cannot do exclusion on field {field} in inclusion projection"
            )));
        }
        let projected_value = if is_inclusion(value) {
            lookup(document, field).cloned()
        } else {
            evaluate(document, value)?
        };
        if let Some(projected_value) = projected_value {
            set_path(&mut projected, field, projected_value);
        }
    }

    Ok(projected)
}

fn count(documents: &[Document], spec: &Bson) -> Result<Vec<Document>, StoreError> {
    let Bson::String(field) = spec else {
        return Err(StoreError::bad_value("the count field must be a non-empty string"));
    };
    if field.is_empty() || field.starts_with('$') {
        return Err(StoreError::bad_value("the count field must be a non-empty string"));
    }

    if documents.is_empty() {
        return Ok(Vec::new());
    }

    let total = i32::try_from(documents.len()).map_or_else(
        |_| Bson::Int64(i64::try_from(documents.len()).unwrap_or(i64::MAX)),
        Bson::Int32,
    );
    Ok(vec![doc! { field.as_str(): total }])
}

/// Integer sums that overflow `i64` continue as a double.
#[allow(clippy::cast_precision_loss)]
fn add_integer(integer: &mut i64, float: &mut f64, is_float: &mut bool, number: i64) {
    match integer.checked_add(number) {
        Some(sum) => *integer = sum,
        None => {
            *float += number as f64;
            *is_float = true;
        }
    }
}

#[derive(Debug, Clone)]
enum Accumulator {
    Sum { integer: i64, float: f64, is_float: bool },
    Avg { total: f64, count: u32 },
    First(Option<Bson>),
    Last(Bson),
    Max(Option<Bson>),
    Min(Option<Bson>),
    Push(Vec<Bson>),
}

impl Accumulator {
    fn new(operator: &str) -> Result<Self, StoreError> {
        Ok(match operator {
            "$sum" => Self::Sum { integer: 0, float: 0.0, is_float: false },
            "$avg" => Self::Avg { total: 0.0, count: 0 },
            "$first" => Self::First(None),
            "$last" => Self::Last(Bson::Null),
            "$max" => Self::Max(None),
            "$min" => Self::Min(None),
            "$push" => Self::Push(Vec::new()),
            other => {
                return Err(StoreError::bad_value(format!(
                    "unknown group operator '{other}'"
                )));
            }
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn add(&mut self, value: Option<Bson>) {
        match self {
            Self::Sum { integer, float, is_float } => match value {
                Some(Bson::Int32(number)) => add_integer(integer, float, is_float, i64::from(number)),
                Some(Bson::Int64(number)) => add_integer(integer, float, is_float, number),
                Some(Bson::Double(number)) => {
                    *float += number;
                    *is_float = true;
                }
                _ => {}
            },
            Self::Avg { total, count } => {
                let number = match value {
                    Some(Bson::Int32(number)) => Some(f64::from(number)),
                    Some(Bson::Int64(number)) => Some(number as f64),
                    Some(Bson::Double(number)) => Some(number),
                    _ => None,
                };
                if let Some(number) = number {
                    *total += number;
                    *count += 1;
                }
            }
            Self::First(first) => {
                if first.is_none() {
                    *first = Some(value.unwrap_or(Bson::Null));
                }
            }
            Self::Last(last) => *last = value.unwrap_or(Bson::Null),
            Self::Max(current) => {
                if let Some(value) = value.filter(|value| *value != Bson::Null) {
                    let replace = current
                        .as_ref()
                        .is_none_or(|current| sort_order(Some(&value), Some(current)).is_gt());
                    if replace {
                        *current = Some(value);
                    }
                }
            }
            Self::Min(current) => {
                if let Some(value) = value.filter(|value| *value != Bson::Null) {
                    let replace = current
                        .as_ref()
                        .is_none_or(|current| sort_order(Some(&value), Some(current)).is_lt());
                    if replace {
                        *current = Some(value);
                    }
                }
            }
            Self::Push(items) => {
                if let Some(value) = value {
                    items.push(value);
                }
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self) -> Bson {
        match self {
            Self::Sum { integer, float, is_float } => {
                if is_float {
                    Bson::Double(integer as f64 + float)
                } else {
                    i32::try_from(integer).map_or(Bson::Int64(integer), Bson::Int32)
                }
            }
            Self::Avg { total, count } => {
                if count == 0 {
                    Bson::Null
                } else {
                    Bson::Double(total / f64::from(count))
                }
            }
            Self::First(value) | Self::Max(value) | Self::Min(value) => value.unwrap_or(Bson::Null),
            Self::Last(value) => value,
            Self::Push(items) => Bson::Array(items),
        }
    }
}

fn group(documents: Vec<Document>, spec: &Document) -> Result<Vec<Document>, StoreError> {
    let id_expression = spec
        .get("_id")
        .ok_or_else(|| StoreError::bad_value("a group specification must include an _id"))?;

    let mut accumulators = Vec::new();
    for (field, definition) in spec {
        if field == "_id" {
            continue;
        }
        let (operator, argument) = definition
            .as_document()
            .and_then(|definition| definition.iter().next())
            .ok_or_else(|| {
                StoreError::bad_value(format!("the field '{field}' must be an accumulator object"))
            })?;
        accumulators.push((field.as_str(), Accumulator::new(operator)?, argument));
    }

    let mut groups: Vec<(Bson, Vec<Accumulator>)> = Vec::new();
    for document in &documents {
        let key = evaluate(document, id_expression)?.unwrap_or(Bson::Null);
        let position = match groups.iter().position(|(existing, _)| values_equal(existing, &key)) {
            Some(position) => position,
            None => {
                let fresh = accumulators.iter().map(|(_, accumulator, _)| accumulator.clone()).collect();
                groups.push((key, fresh));
                groups.len() - 1
            }
        };

        for (index, (_, _, argument)) in accumulators.iter().enumerate() {
            let value = evaluate(document, argument)?;
            groups[position].1[index].add(value);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, states)| {
            let mut output = doc! { "_id": key };
            for ((field, _, _), state) in accumulators.iter().zip(states) {
                output.insert(*field, state.finish());
            }
            output
        })
        .collect())
}
