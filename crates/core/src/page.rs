use serde::{Deserialize, Serialize};

/// Zero-based, half-open row range `[start, end)` of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Range of the page at `page` (0-based) for the given batch size.
    #[must_use]
    pub const fn for_page(page: usize, batch_size: usize) -> Self {
        Self {
            start: page.saturating_mul(batch_size),
            end: page.saturating_add(1).saturating_mul(batch_size),
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One page returned by the fetch capability.
///
/// An empty `records` vector is the only exhaustion signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub records: Vec<T>,
    /// Backend-reported total; not reliably repeated after the first page.
    pub total_count: Option<usize>,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn new(records: Vec<T>, total_count: Option<usize>) -> Self {
        Self { records, total_count }
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self { records: Vec::new(), total_count: None }
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_page_offsets() {
        assert_eq!(PageRange::for_page(0, 5000), PageRange::new(0, 5000));
        assert_eq!(PageRange::for_page(3, 2), PageRange::new(6, 8));
        assert_eq!(PageRange::for_page(3, 2).len(), 2);
    }

    #[test]
    fn test_for_page_saturates() {
        let range = PageRange::for_page(usize::MAX, 2);
        assert_eq!(range.start, usize::MAX);
        assert_eq!(range.end, usize::MAX);
        assert!(range.is_empty());
    }

    #[test]
    fn test_empty_page_is_exhausted() {
        assert!(Page::<u32>::empty().is_exhausted());
        assert!(!Page::new(vec![1], Some(1)).is_exhausted());
    }
}
