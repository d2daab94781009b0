use std::sync::LazyLock;

use bson::Bson;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

static DATE_TIME_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}.\d{2}:\d{2}:\d{2}").expect("date-time shape regex is valid")
});

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

const UTC_SUFFIXES: [&str; 2] = [" UTC", "Z"];

/// Normalise a condition value into a list.
///
/// Arrays keep their order and length; any other value becomes a one-element list.
/// Strings that look like and parse as a date-time become BSON UTC date-times.
#[must_use]
pub fn normalize(value: Bson) -> Vec<Bson> {
    let values = match value {
        Bson::Array(values) => values,
        other => vec![other],
    };

    values.into_iter().map(coerce_date_time).collect()
}

fn coerce_date_time(value: Bson) -> Bson {
    match value {
        Bson::String(text) if DATE_TIME_SHAPE.is_match(&text) => match parse_date_time(&text) {
            Some(parsed) => Bson::DateTime(bson::DateTime::from_chrono(parsed)),
            None => Bson::String(text),
        },
        other => other,
    }
}

/// Parse a date-time into UTC.
///
/// Accepts RFC 3339, `YYYY-MM-DD[T ]HH:MM:SS[.f]` with a `+hhmm` offset, and the same
/// form without an offset (optionally suffixed with `Z` or ` UTC`), which is taken as UTC.
#[must_use]
pub fn parse_date_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Some(parsed) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(text, format).ok())
    {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = UTC_SUFFIXES
        .iter()
        .find_map(|suffix| text.strip_suffix(suffix))
        .unwrap_or(text)
        .trim_end();

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
        .map(|naive| naive.and_utc())
}
