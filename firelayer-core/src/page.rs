//! Pagination: result pages and skip/limit slicing.
//!
//! Firestore-like backends have no native offset. A page at `skip`/`limit` is served
//! either by asking the backend for `skip + limit` ordered documents and dropping the
//! first `skip` ([`Paginator::slice_prefetched`]), or by slicing a fully fetched and
//! sorted result set ([`Paginator::slice_sorted`]). Both produce the same window.

use serde::{Deserialize, Serialize};

/// A single page of results.
///
/// ```ignore
/// use firelayer::page::Page;
///
/// let page = Page::builder(vec!["a", "b"]).with_total(12).with_skip(10).build();
/// assert!(!page.has_more());
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total number of matching items, ignoring skip and limit.
    pub total: usize,
    /// Number of matching items skipped before this page.
    pub skip: usize,
    /// Requested page size, `None` when unbounded.
    pub limit: Option<usize>,
}

impl<T> Page<T> {
    /// Creates a new builder for constructing a page.
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }

    /// Returns `true` if matching items exist beyond this page.
    pub fn has_more(&self) -> bool {
        self.skip + self.items.len() < self.total
    }

    /// Transforms the items while keeping the pagination metadata.
    pub fn map_items<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<Vec<_>, E>>()?,
            total: self.total,
            skip: self.skip,
            limit: self.limit,
        })
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            skip: 0,
            limit: None,
        }
    }
}

/// Builder for [`Page`] instances.
pub struct PageBuilder<T> {
    items: Vec<T>,
    total: usize,
    skip: usize,
    limit: Option<usize>,
}

impl<T> PageBuilder<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            total: 0,
            skip: 0,
            limit: None,
        }
    }

    /// Sets the total count of matching items.
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = total;
        self
    }

    /// Sets the number of skipped items.
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the requested page size.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn build(self) -> Page<T> {
        Page {
            items: self.items,
            total: self.total,
            skip: self.skip,
            limit: self.limit,
        }
    }
}

/// Skip/limit window applied to ordered results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    pub skip: usize,
    pub limit: Option<usize>,
}

impl Paginator {
    pub fn new(skip: usize, limit: Option<usize>) -> Self {
        Self { skip, limit }
    }

    /// The native limit needed to cover the window when the backend cannot skip.
    ///
    /// With `skip == 0` this is just `limit`, so nothing is fetched only to be discarded.
    pub fn native_limit(&self) -> Option<usize> {
        self.limit.map(|limit| limit.saturating_add(self.skip))
    }

    /// Slices results the backend already ordered and limited to [`Self::native_limit`].
    pub fn slice_prefetched<T>(&self, mut items: Vec<T>) -> Vec<T> {
        if self.skip > 0 {
            items.drain(..self.skip.min(items.len()));
        }

        if let Some(limit) = self.limit {
            items.truncate(limit);
        }

        items
    }

    /// Slices a fully fetched and sorted result set to `[skip, skip + limit)`.
    pub fn slice_sorted<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Page-number based pagination as exposed by HTTP handlers.
///
/// Pages are 1-indexed.
///
/// ```ignore
/// use firelayer::page::PaginationParams;
///
/// let params = PaginationParams::new(3, 24);
/// assert_eq!(params.offset(), 48);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of items per page.
    pub per_page: usize,
}

impl PaginationParams {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    pub fn builder() -> PaginationParamsBuilder {
        PaginationParamsBuilder::new()
    }

    /// Number of items to skip for this page. Page `0` is treated as page `1`.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    /// Returns the skip/limit window for this page.
    pub fn paginator(&self) -> Paginator {
        Paginator::new(self.offset(), Some(self.per_page))
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}

/// Builder for [`PaginationParams`].
pub struct PaginationParamsBuilder {
    page: Option<usize>,
    per_page: Option<usize>,
}

impl PaginationParamsBuilder {
    pub fn new() -> Self {
        Self { page: None, per_page: None }
    }

    /// Sets the page number (1-indexed).
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    /// Sets the number of items per page.
    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Builds the parameters, defaulting to page 1 of 10 items.
    pub fn build(self) -> PaginationParams {
        PaginationParams {
            page: self.page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(10),
        }
    }
}

impl Default for PaginationParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_limit_covers_the_skipped_prefix() {
        assert_eq!(Paginator::new(0, Some(10)).native_limit(), Some(10));
        assert_eq!(Paginator::new(20, Some(10)).native_limit(), Some(30));
        assert_eq!(Paginator::new(5, None).native_limit(), None);
        assert_eq!(Paginator::new(usize::MAX, Some(2)).native_limit(), Some(usize::MAX));
    }

    #[test]
    fn prefetched_and_sorted_slices_agree() {
        let all: Vec<u32> = (0..25).collect();

        for skip in [0, 3, 10, 24, 25, 40] {
            for limit in [Some(1), Some(10), None] {
                let paginator = Paginator::new(skip, limit);
                let prefetched: Vec<u32> = match paginator.native_limit() {
                    Some(n) => all.iter().copied().take(n).collect(),
                    None => all.clone(),
                };

                assert_eq!(
                    paginator.slice_prefetched(prefetched),
                    paginator.slice_sorted(all.clone()),
                    "skip={skip} limit={limit:?}"
                );
            }
        }
    }

    #[test]
    fn pagination_params_offsets() {
        assert_eq!(PaginationParams::new(1, 24).offset(), 0);
        assert_eq!(PaginationParams::new(3, 24).offset(), 48);
        assert_eq!(PaginationParams::new(0, 24).offset(), 0);
        assert_eq!(PaginationParams::builder().with_page(2).build().paginator(), Paginator::new(10, Some(10)));
    }

    #[test]
    fn has_more_tracks_the_window() {
        let page = Page::builder(vec![1, 2]).with_total(5).with_skip(2).with_limit(Some(2)).build();
        assert!(page.has_more());

        let last = Page::builder(vec![5]).with_total(5).with_skip(4).build();
        assert!(!last.has_more());
    }

    #[test]
    fn map_items_keeps_metadata() {
        let page = Page::builder(vec![1, 2]).with_total(7).with_skip(2).build();
        let mapped: Page<String> = page.map_items(|n| Ok::<_, ()>(n.to_string())).unwrap();

        assert_eq!(mapped.items, vec!["1", "2"]);
        assert_eq!(mapped.total, 7);
        assert_eq!(mapped.skip, 2);
    }
}
