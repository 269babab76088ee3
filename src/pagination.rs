use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// PaginationParams
///
/// `limit`/`offset` query parameters accepted by the paginated list endpoints.
/// Values are kept as raw strings so malformed input falls back to the
/// unpaginated listing instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PaginationParams {
    /// Page size. Without a positive limit the full list is returned.
    pub limit: Option<String>,
    /// Number of items to skip. Defaults to 0.
    pub offset: Option<String>,
}

/// A resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl PaginationParams {
    /// Resolves the window, or `None` when the caller did not ask for pagination.
    pub fn page_request(&self) -> Option<PageRequest> {
        let limit = self
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l > 0)?;
        let offset = self
            .offset
            .as_deref()
            .and_then(|o| o.trim().parse::<i64>().ok())
            .filter(|o| *o >= 0)
            .unwrap_or(0);
        Some(PageRequest { limit, offset })
    }
}

/// Page
///
/// One window of a list plus the total count and links to the neighbouring
/// windows (path and query only, or `null` at either end).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(path: &str, request: PageRequest, count: i64, results: Vec<T>) -> Self {
        let PageRequest { limit, offset } = request;

        // Both values come from the query string; a window past i64::MAX has no next page.
        let next = offset
            .checked_add(limit)
            .filter(|end| *end < count)
            .map(|end| format!("{}?limit={}&offset={}", path, limit, end));

        let previous = if offset <= 0 {
            None
        } else if offset - limit <= 0 {
            Some(format!("{}?limit={}", path, limit))
        } else {
            Some(format!("{}?limit={}&offset={}", path, limit, offset - limit))
        };

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

/// Listing
///
/// Response body of a paginated endpoint: a `Page` when `limit` was given,
/// otherwise the bare array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Listing<T> {
    Page(Page<T>),
    All(Vec<T>),
}

impl<T> Listing<T> {
    /// The items in this listing, regardless of shape.
    pub fn items(&self) -> &[T] {
        match self {
            Listing::Page(page) => &page.results,
            Listing::All(items) => items,
        }
    }
}
