use std::fmt;

use axum::response::{IntoResponse, Response};
use bson::{Bson, Document};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{json::JsonString, serde_as};
use utoipa::ToSchema;

use crate::filtering::pagination::{Paging, calculate_content_range};

/// Outer list is AND-ed, each inner list is OR-ed.
pub type FilterGroup = Vec<Vec<Condition>>;

/// Structured grid request: filtering, sorting, search and paging.
///
/// # Filtering
/// `filter` is a list of OR-groups that are AND-ed together:
/// ```json
/// [[{"column": "int", "operator": "GTE", "value": 8}],
///  [{"column": "string", "operator": "EQ", "value": "String 8"},
///   {"column": "string", "operator": "EQ", "value": "String 9"}]]
/// ```
/// `additionalFilters` has the same shape and is always AND-ed with `filter`.
///
/// # Sorting
/// `sorter` (alias `orderBy`) is an ordered list, first entry is the primary key:
/// ```json
/// [{"column": "int", "direction": "DESC"}]
/// ```
///
/// # Pagination
/// `page` is 1-based; `page` and `itemsPerPage` below 1 are treated as 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GridRequest {
    /// Primary filter, echoed back in the response.
    pub filter: FilterGroup,
    /// Server-side filter AND-ed with the primary filter.
    pub additional_filters: FilterGroup,
    #[serde(rename = "sorter", alias = "orderBy")]
    pub order_by: Vec<Sortation>,
    /// Free-text search; empty means no search.
    pub search: Option<String>,
    pub page: u64,
    pub items_per_page: u64,
    /// Pre-built filter document, used only by resources that allow it.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub native_query: Option<Document>,
}

impl Default for GridRequest {
    fn default() -> Self {
        Self {
            filter: Vec::new(),
            additional_filters: Vec::new(),
            order_by: Vec::new(),
            search: None,
            page: 1,
            items_per_page: 10,
            native_query: None,
        }
    }
}

impl GridRequest {
    #[must_use]
    pub fn with_filter(mut self, filter: FilterGroup) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_additional_filters(mut self, filters: FilterGroup) -> Self {
        self.additional_filters = filters;
        self
    }

    #[must_use]
    pub fn with_order_by(mut self, order_by: Vec<Sortation>) -> Self {
        self.order_by = order_by;
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    #[must_use]
    pub const fn with_page(mut self, page: u64, items_per_page: u64) -> Self {
        self.page = page;
        self.items_per_page = items_per_page;
        self
    }

    #[must_use]
    pub fn with_native_query(mut self, query: Document) -> Self {
        self.native_query = Some(query);
        self
    }

    /// 1-based page number, never below 1.
    #[must_use]
    pub fn page(&self) -> u64 {
        self.page.max(1)
    }

    /// Page size, never below 1.
    #[must_use]
    pub fn items_per_page(&self) -> u64 {
        self.items_per_page.max(1)
    }

    /// Number of documents skipped before the current page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.items_per_page())
    }

    /// The search term, if any non-empty one was given.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|term| !term.is_empty())
    }

    #[must_use]
    pub fn has_search(&self) -> bool {
        self.search_term().is_some()
    }

    /// True when the primary or additional filter contains a non-empty OR group.
    #[must_use]
    pub fn has_filter(&self) -> bool {
        self.filter
            .iter()
            .chain(&self.additional_filters)
            .any(|group| !group.is_empty())
    }
}

/// A single filter condition. Structural validation happens at compile time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "EQ")]
    pub operator: Option<Operator>,
    /// Explicit `null` is a present value; only an absent key is `None`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<Object>)]
    pub value: Option<Bson>,
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Bson>, D::Error>
where
    D: Deserializer<'de>,
{
    Bson::deserialize(deserializer).map(Some)
}

impl Condition {
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Bson>) -> Self {
        Self {
            column: Some(column.into()),
            operator: Some(operator),
            value: Some(value.into()),
        }
    }

    /// A condition without a value, for `EMPTY`, `NEMPTY`, `EXIST` and `NEXIST`.
    pub fn without_value(column: impl Into<String>, operator: Operator) -> Self {
        Self {
            column: Some(column.into()),
            operator: Some(operator),
            value: None,
        }
    }
}

/// Filter operators. Unrecognised names are kept in `Other` and compiled as equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    In,
    Nin,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    Starts,
    Ends,
    NotEmpty,
    Empty,
    Between,
    NotBetween,
    Exist,
    NotExist,
    Other(String),
}

impl Operator {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Eq => "EQ",
            Self::Neq => "NEQ",
            Self::In => "IN",
            Self::Nin => "NIN",
            Self::Gt => "GT",
            Self::Lt => "LT",
            Self::Gte => "GTE",
            Self::Lte => "LTE",
            Self::Like => "LIKE",
            Self::Starts => "STARTS",
            Self::Ends => "ENDS",
            Self::NotEmpty => "NEMPTY",
            Self::Empty => "EMPTY",
            Self::Between => "BETWEEN",
            Self::NotBetween => "NBETWEEN",
            Self::Exist => "EXIST",
            Self::NotExist => "NEXIST",
            Self::Other(name) => name,
        }
    }

    /// False for `EMPTY`, `NEMPTY`, `EXIST` and `NEXIST`, which may omit `value`.
    #[must_use]
    pub const fn requires_value(&self) -> bool {
        !matches!(
            self,
            Self::Empty | Self::NotEmpty | Self::Exist | Self::NotExist
        )
    }
}

impl From<&str> for Operator {
    fn from(name: &str) -> Self {
        match name {
            "EQ" => Self::Eq,
            "NEQ" => Self::Neq,
            "IN" => Self::In,
            "NIN" => Self::Nin,
            "GT" => Self::Gt,
            "LT" => Self::Lt,
            "GTE" => Self::Gte,
            "LTE" => Self::Lte,
            "LIKE" => Self::Like,
            "STARTS" => Self::Starts,
            "ENDS" => Self::Ends,
            "NEMPTY" => Self::NotEmpty,
            "EMPTY" => Self::Empty,
            "BETWEEN" => Self::Between,
            "NBETWEEN" => Self::NotBetween,
            "EXIST" => Self::Exist,
            "NEXIST" => Self::NotExist,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from(name.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Sortation {
    pub column: String,
    #[serde(default)]
    pub direction: Direction,
}

impl Sortation {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }
}

/// Sort direction. Any value other than `ASC` (case-insensitive) sorts descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ToSchema)]
#[schema(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    /// Sort key value understood by the store.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        })
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

/// One page of shaped documents plus the total number of matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPage {
    pub items: Vec<Document>,
    pub total: u64,
}

/// Response envelope for grid endpoints.
#[serde_as]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GridResponse {
    /// The primary filter, echoed back as a JSON string.
    #[serde_as(as = "JsonString")]
    #[schema(value_type = String)]
    pub filter: FilterGroup,
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<Document>,
    pub paging: Paging,
    pub search: Option<String>,
    pub sorter: Option<Vec<Sortation>>,
    #[serde(skip)]
    resource: String,
}

impl GridResponse {
    pub fn new(resource: impl Into<String>, request: &GridRequest, page: ResultPage) -> Self {
        Self {
            filter: request.filter.clone(),
            items: page.items,
            paging: Paging::new(request.page(), request.items_per_page(), page.total),
            search: request.search.clone(),
            sorter: (!request.order_by.is_empty()).then(|| request.order_by.clone()),
            resource: resource.into(),
        }
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

impl IntoResponse for GridResponse {
    fn into_response(self) -> Response {
        let offset = (self.paging.page - 1).saturating_mul(self.paging.items_per_page);
        let headers = calculate_content_range(
            offset,
            self.paging.items_per_page,
            self.paging.total,
            &self.resource,
        );

        (headers, axum::Json(self)).into_response()
    }
}
