use serde::Serialize;

pub mod academic;
pub mod accounts;
pub mod activities;
pub mod activity_types;
pub mod admins;
pub mod assignments;
pub mod attachments;
pub mod channels;
pub mod faculty;
pub mod friendships;
pub mod institutes;
pub mod messages;
pub mod notifications;
pub mod programs;
pub mod students;
pub mod users;
pub mod validate;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub items_per_page: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, current_page: u64, items_per_page: u64, total_items: u64) -> Self {
        Self {
            items,
            pagination: Pagination {
                current_page,
                total_pages: total_items.div_ceil(items_per_page.max(1)),
                total_items,
                items_per_page,
            },
        }
    }
}

/// 1-based page number and page size, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One rejected row of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub index: usize,
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkReport<T> {
    pub created: Vec<T>,
    pub failed: Vec<BulkFailure>,
}

impl<T> Default for BulkReport<T> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            failed: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_counts_partial_last_page() {
        let page = Page::new(vec![1, 2, 3], 1, 10, 21);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(page.pagination.items_per_page, 10);
    }

    #[test]
    fn test_empty_page_has_zero_pages() {
        let page: Page<u8> = Page::new(vec![], 1, 10, 0);
        assert_eq!(page.pagination.total_pages, 0);
    }

    #[test]
    fn test_page_request_clamps() {
        let req = PageRequest::new(Some(0), Some(1000));
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(Some(3), Some(5)).offset(), 10);
    }
}
