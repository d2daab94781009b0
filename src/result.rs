use std::fmt::Write as _;

use bson::{Bson, Document};
use chrono::format::{Item, StrftimeItems};

use crate::errors::GridError;

/// Default output format for dates: ISO 8601 in UTC.
pub const DATE_TIME_UTC: &str = "%Y-%m-%dT%H:%M:%SZ";
/// Alternative output format without the `T` separator and zone suffix.
pub const DATE_TIME: &str = "%Y-%m-%d %H:%M:%S";

/// Shape raw documents for output.
///
/// At the top level of each document an `ObjectId` is replaced in place by an `id` field
/// holding its hex string, and every date-time is rendered with `date_format`. Other fields
/// and their order are kept. A document's own non-`ObjectId` `id` field is dropped when the
/// document carries an `ObjectId`, so the derived `id` wins whatever the field order.
///
/// # Errors
///
/// Returns [`GridError::InvalidDateFormat`] when `date_format` is not a valid chrono
/// format string.
pub fn shape_documents(documents: Vec<Document>, date_format: &str) -> Result<Vec<Document>, GridError> {
    let items = StrftimeItems::new(date_format).parse().map_err(|_| invalid(date_format))?;

    documents
        .into_iter()
        .map(|document| shape_document(document, &items, date_format))
        .collect()
}

fn invalid(format: &str) -> GridError {
    GridError::InvalidDateFormat {
        format: format.to_string(),
    }
}

fn shape_document(document: Document, items: &[Item<'_>], format: &str) -> Result<Document, GridError> {
    let mut shaped = Document::new();
    let has_object_id = document.values().any(|value| matches!(value, Bson::ObjectId(_)));

    for (key, value) in document {
        match value {
            _ if has_object_id && key == "id" && !matches!(value, Bson::ObjectId(_)) => {}
            Bson::ObjectId(id) => {
                shaped.insert("id", id.to_hex());
            }
            Bson::DateTime(date) => {
                let mut rendered = String::new();
                write!(
                    rendered,
                    "{}",
                    date.to_chrono().format_with_items(items.iter())
                )
                .map_err(|_| invalid(format))?;
                shaped.insert(key, rendered);
            }
            other => {
                shaped.insert(key, other);
            }
        }
    }

    Ok(shaped)
}
