//! Pagination State for server-paginated lists.

use serde::{Deserialize, Serialize};

use crate::resource::ServerPagination;

pub const DEFAULT_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl PaginationState {
    pub fn new(limit: u32) -> Self {
        Self {
            page: 1,
            limit: limit.max(1),
            total: 0,
            total_pages: 0,
        }
    }

    /// Highest page that may be requested. An empty list still has page 1.
    pub fn last_page(&self) -> u32 {
        self.total_pages.max(1)
    }

    /// Move to `page`, clamped to `[1, last_page]`.
    ///
    /// Returns the page to fetch, or `None` when the clamped page is the
    /// current one and nothing needs refetching.
    pub fn set_page(&mut self, page: u32) -> Option<u32> {
        let clamped = page.clamp(1, self.last_page());
        if clamped == self.page {
            return None;
        }
        self.page = clamped;
        Some(clamped)
    }

    pub fn next(&mut self) -> Option<u32> {
        self.set_page(self.page.saturating_add(1))
    }

    pub fn prev(&mut self) -> Option<u32> {
        self.set_page(self.page.saturating_sub(1))
    }

    pub fn has_next(&self) -> bool {
        self.page < self.last_page()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// New page size; always back to page 1.
    pub fn set_limit(&mut self, limit: u32) {
        self.limit = limit.max(1);
        self.page = 1;
    }

    /// A server-side filter changed; back to page 1.
    pub fn reset(&mut self) {
        self.page = 1;
    }

    /// Take the server's numbers. A page beyond the new last page is pulled
    /// back so the next request stays in range.
    pub fn apply_server(&mut self, server: &ServerPagination) {
        self.limit = server.limit.max(1);
        self.total = server.total;
        self.total_pages = server.total_pages;
        self.page = server.page.clamp(1, self.last_page());
    }

    /// Used when the server omits pagination: derive it from a full list.
    pub fn apply_unpaged(&mut self, count: usize) {
        self.total = count as u64;
        self.total_pages = (count as u64).div_ceil(self.limit as u64) as u32;
        self.page = self.page.clamp(1, self.last_page());
    }

    pub fn query(&self) -> Vec<(String, String)> {
        vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ]
    }

    /// 1-based index of the first item on this page, 0 when empty.
    pub fn first_item(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            (self.page.max(1) as u64 - 1) * self.limit.max(1) as u64 + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five_pages() -> PaginationState {
        let mut p = PaginationState::new(10);
        p.apply_server(&ServerPagination {
            page: 1,
            limit: 10,
            total: 45,
            total_pages: 5,
        });
        p
    }

    #[test]
    fn set_page_clamps_low_and_high() {
        let mut p = five_pages();
        p.set_page(3);
        assert_eq!(p.set_page(0), Some(1));
        assert_eq!(p.page, 1);
        assert_eq!(p.set_page(5 + 5), Some(5));
        assert_eq!(p.page, 5);
    }

    #[test]
    fn clamped_to_current_page_needs_no_fetch() {
        let mut p = five_pages();
        assert_eq!(p.set_page(0), None);
        assert_eq!(p.page, 1);
    }

    #[test]
    fn next_and_prev_stop_at_bounds() {
        let mut p = five_pages();
        assert_eq!(p.prev(), None);
        assert_eq!(p.next(), Some(2));
        p.set_page(5);
        assert_eq!(p.next(), None);
        assert!(!p.has_next());
        assert!(p.has_prev());
    }

    #[test]
    fn limit_change_resets_page() {
        let mut p = five_pages();
        p.set_page(4);
        p.set_limit(25);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 25);
    }

    #[test]
    fn zero_limit_is_floored() {
        let mut p = PaginationState::new(0);
        assert_eq!(p.limit, 1);
        p.set_limit(0);
        assert_eq!(p.limit, 1);
    }

    #[test]
    fn empty_list_has_one_page() {
        let mut p = PaginationState::default();
        assert_eq!(p.last_page(), 1);
        assert_eq!(p.set_page(7), None);
        assert_eq!(p.first_item(), 0);
    }

    #[test]
    fn server_page_beyond_total_is_pulled_back() {
        let mut p = PaginationState::default();
        p.apply_server(&ServerPagination {
            page: 9,
            limit: 10,
            total: 12,
            total_pages: 2,
        });
        assert_eq!(p.page, 2);
        assert_eq!(p.first_item(), 11);
    }

    #[test]
    fn first_item_tolerates_zero_page() {
        let p: PaginationState =
            serde_json::from_str(r#"{"page":0,"limit":10,"total":5,"totalPages":1}"#).unwrap();
        assert_eq!(p.first_item(), 1);
    }

    #[test]
    fn unpaged_counts() {
        let mut p = PaginationState::new(10);
        p.apply_unpaged(21);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.total, 21);
    }

    #[test]
    fn query_params() {
        let mut p = five_pages();
        p.set_page(2);
        assert_eq!(
            p.query(),
            vec![("page".into(), "2".into()), ("limit".into(), "10".into())]
        );
    }
}
