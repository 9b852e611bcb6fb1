//! One page of results plus the total the page was cut from.

use serde::Serialize;

/// Results of a paginated query
///
/// `total_size` is the number of matching rows (or groups) independent of the
/// page window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedList<T> {
    items: Vec<T>,
    total_size: u64,
    first_result: u64,
    max_results: u64,
}

impl<T> PagedList<T> {
    pub fn new(items: Vec<T>, total_size: u64, first_result: u64, max_results: u64) -> Self {
        Self {
            items,
            total_size,
            first_result,
            max_results,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of items on this page
    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn first_result(&self) -> u64 {
        self.first_result
    }

    pub fn max_results(&self) -> u64 {
        self.max_results
    }

    /// Number of pages of `max_results` items needed for `total_size`
    pub fn total_pages(&self) -> u64 {
        if self.max_results == 0 {
            return 0;
        }
        self.total_size.div_ceil(self.max_results)
    }

    /// One-based number of this page
    pub fn page(&self) -> u64 {
        if self.max_results == 0 {
            return 0;
        }
        self.first_result / self.max_results + 1
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> IntoIterator for PagedList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a PagedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
