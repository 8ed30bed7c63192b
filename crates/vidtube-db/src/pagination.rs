use vidtube_types::models::Page;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Hard cap on page size. Larger requests are clamped, not rejected.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A 1-indexed page request with both numbers clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    /// Wrap one page of results with the listing metadata.
    pub fn into_page<T>(self, docs: Vec<T>, total_docs: u64) -> Page<T> {
        let total_pages =
            u32::try_from(total_docs.div_ceil(u64::from(self.limit)).max(1)).unwrap_or(u32::MAX);
        let has_prev_page = self.page > 1;
        let has_next_page = self.page < total_pages;
        Page {
            docs,
            total_docs,
            limit: self.limit,
            page: self.page,
            total_pages,
            has_prev_page,
            has_next_page,
            prev_page: has_prev_page.then(|| self.page - 1),
            next_page: has_next_page.then(|| self.page + 1),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        let req = PageRequest::default();
        assert_eq!((req.page(), req.limit()), (1, DEFAULT_PAGE_SIZE));

        let req = PageRequest::new(Some(0), Some(0));
        assert_eq!((req.page(), req.limit()), (1, 1));

        let req = PageRequest::new(Some(3), Some(10_000));
        assert_eq!(req.limit(), MAX_PAGE_SIZE);
        assert_eq!(req.offset(), 200);
    }

    #[test]
    fn page_metadata() {
        let page = PageRequest::new(Some(2), Some(5)).into_page(vec![(); 5], 12);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_prev_page);
        assert!(page.has_next_page);
        assert_eq!(page.prev_page, Some(1));
        assert_eq!(page.next_page, Some(3));

        let last = PageRequest::new(Some(3), Some(5)).into_page(vec![(); 2], 12);
        assert!(!last.has_next_page);
        assert_eq!(last.next_page, None);
    }

    #[test]
    fn empty_listing_reports_single_page() {
        let page = PageRequest::default().into_page(Vec::<()>::new(), 0);
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_next_page);
        assert!(!page.has_prev_page);
    }
}
