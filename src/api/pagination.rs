use serde::{Deserialize, Serialize};

/// Number of records served per listing page.
pub const ITEMS_PER_PAGE: u64 = 30;

/// Highest page number accepted; its skip still fits MongoDB's `i64`.
pub const MAX_PAGE: u64 = i64::MAX as u64 / ITEMS_PER_PAGE;

/// Clamp a requested page into `1..=MAX_PAGE`.
pub fn clamp_page(page: Option<u64>) -> u64 {
    page.unwrap_or(1).clamp(1, MAX_PAGE)
}

/// `?page=N` query parameter shared by every paginated route.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
}

impl PageQuery {
    /// The requested page, clamped into `1..=MAX_PAGE`.
    pub fn page(&self) -> u64 {
        clamp_page(self.page)
    }
}

/// Navigation metadata returned next to a page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub total_pages: u64,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_page: Option<u64>,
    pub next_page: Option<u64>,
}

impl Pagination {
    pub fn new(page: u64, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(ITEMS_PER_PAGE);
        let has_prev = page > 1;
        let has_next = page < total_pages;

        Self {
            page,
            total_pages,
            has_prev,
            has_next,
            prev_page: has_prev.then(|| page - 1),
            next_page: has_next.then(|| page + 1),
        }
    }
}

/// Number of records to skip to reach `page`, capped at `i64::MAX`.
pub fn skip_for(page: u64, per_page: u64) -> u64 {
    page.saturating_sub(1)
        .saturating_mul(per_page)
        .min(i64::MAX as u64)
}
