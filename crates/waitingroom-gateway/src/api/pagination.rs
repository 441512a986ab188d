//! Paging for the management list endpoints.

use axum::http::{HeaderMap, HeaderValue};
use serde::Deserialize;

/// Raw `page` / `per_page` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Response headers describing the returned page.
pub const HEADER_CURRENT_PAGE: &str = "X-Pagination-Current-Page";
pub const HEADER_LIMIT: &str = "X-Pagination-Limit";
pub const HEADER_TOTAL_PAGES: &str = "X-Pagination-Total-Pages";

/// Maximum (and default) page size.
const MAX_PER_PAGE: i64 = 100;

/// Normalized paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    /// Normalizes query parameters: page defaults to 1 and is clamped to at
    /// least 1, per_page defaults to 100 and is clamped to 1..=100.
    #[must_use]
    pub fn from_query(query: &PageQuery) -> Self {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(MAX_PER_PAGE).clamp(1, MAX_PER_PAGE);
        Self { page, per_page }
    }

    /// Inclusive `start..=stop` offsets for a sorted-set range read.
    #[must_use]
    pub const fn range(&self) -> (isize, isize) {
        let start = (self.page - 1) * self.per_page;
        let stop = self.page * self.per_page - 1;
        (start as isize, stop as isize)
    }

    /// Writes the current-page and limit headers.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(
            HEADER_CURRENT_PAGE,
            HeaderValue::from_str(&self.page.to_string()).expect("integer header value"),
        );
        headers.insert(
            HEADER_LIMIT,
            HeaderValue::from_str(&self.per_page.to_string()).expect("integer header value"),
        );
    }
}

/// Writes the total header alongside a page's items.
pub fn apply_total_header(headers: &mut HeaderMap, total: i64) {
    headers.insert(
        HEADER_TOTAL_PAGES,
        HeaderValue::from_str(&total.to_string()).expect("integer header value"),
    );
}
