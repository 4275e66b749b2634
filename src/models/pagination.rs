use serde::Serialize;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// A 1-based page request with a bounded page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    /// Builds a page request from raw query-string values.
    ///
    /// Missing, non-numeric or zero values fall back to the defaults; `limit`
    /// is capped at [`MAX_LIMIT`].
    pub fn from_params(page: Option<&str>, limit: Option<&str>, default_limit: u32) -> Self {
        let parse = |raw: Option<&str>| {
            raw.and_then(|s| s.trim().parse::<u32>().ok())
                .filter(|v| *v > 0)
        };
        Self::new(
            parse(page).unwrap_or(DEFAULT_PAGE),
            parse(limit).unwrap_or(default_limit),
        )
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit)
    }
}

/// Pagination metadata returned alongside a page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total_items: i64) -> Self {
        let total_items = total_items.max(0);
        let limit = i64::from(request.limit);
        let total_pages = (total_items + limit - 1) / limit;

        Self {
            current_page: request.page,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
            total_items,
            has_next_page: i64::from(request.page) * limit < total_items,
            has_prev_page: request.page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_params_missing() {
        let page = PageRequest::from_params(None, None, DEFAULT_LIMIT);
        assert_eq!(page, PageRequest { page: 1, limit: 20 });
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_invalid_params_fall_back() {
        let page = PageRequest::from_params(Some("abc"), Some("0"), 10);
        assert_eq!(page, PageRequest { page: 1, limit: 10 });
    }

    #[test]
    fn test_limit_is_capped() {
        let page = PageRequest::from_params(Some("3"), Some("5000"), DEFAULT_LIMIT);
        assert_eq!(page.limit, MAX_LIMIT);
        assert_eq!(page.offset(), 200);
    }

    #[test]
    fn test_pagination_middle_page() {
        let meta = Pagination::new(PageRequest::new(2, 2), 5);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next_page);
        assert!(meta.has_prev_page);
    }

    #[test]
    fn test_pagination_last_page() {
        let meta = Pagination::new(PageRequest::new(3, 2), 5);
        assert!(!meta.has_next_page);
        assert!(meta.has_prev_page);
    }

    #[test]
    fn test_pagination_empty() {
        let meta = Pagination::new(PageRequest::default(), 0);
        assert_eq!(meta.total_pages, 0);
        assert_eq!(meta.total_items, 0);
        assert!(!meta.has_next_page);
        assert!(!meta.has_prev_page);
    }
}
