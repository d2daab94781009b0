use axum::http::{
    HeaderValue,
    header::{CONTENT_RANGE, HeaderMap},
};
use serde::Serialize;
use utoipa::ToSchema;

/// Paging block of the response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    pub items_per_page: u64,
    pub last_page: u64,
    pub next_page: u64,
    pub page: u64,
    pub previous_page: u64,
    pub total: u64,
}

impl Paging {
    /// `page` and `items_per_page` must already be clamped to at least 1.
    #[must_use]
    pub fn new(page: u64, items_per_page: u64, total: u64) -> Self {
        let items_per_page = items_per_page.max(1);
        let page = page.max(1);
        let last_page = total.div_ceil(items_per_page).max(1);

        Self {
            items_per_page,
            last_page,
            next_page: last_page.min(page.saturating_add(1)),
            page,
            previous_page: page.saturating_sub(1).max(1),
            total,
        }
    }
}

/// Sanitize resource name by removing control characters for HTTP headers
fn sanitize_resource_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect()
}

/// Build the `Content-Range` header for one page of results.
///
/// # Arguments
///
/// * `offset` - Index of the first document on the page.
/// * `limit` - Page size.
/// * `total_count` - Total number of matching documents.
/// * `resource_name` - Resource label placed in front of the range.
///
/// The end of the range never passes the last existing document. Non-ASCII and control
/// characters are stripped from the resource name.
#[must_use]
pub fn calculate_content_range(
    offset: u64,
    limit: u64,
    total_count: u64,
    resource_name: &str,
) -> HeaderMap {
    let end = offset
        .saturating_add(limit.max(1) - 1)
        .min(total_count.saturating_sub(1));

    let safe_name = sanitize_resource_name(resource_name);
    let content_range = format!("{safe_name} {offset}-{end}/{total_count}");

    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&content_range)
        .unwrap_or_else(|_| HeaderValue::from_static("items 0-0/0"));
    headers.insert(CONTENT_RANGE, value);

    headers
}
