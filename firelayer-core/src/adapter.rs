//! The query layer handed to request handlers.
//!
//! [`QueryAdapter`] translates a [`Query`], picks the execution strategy and returns
//! ordered, paginated results:
//!
//! - a single native branch runs as one ordered, limited backend query, with the
//!   in-memory fallback when the backend lacks a composite index;
//! - a single branch with post-filters, or a union of branches, is fetched in full,
//!   de-duplicated, sorted once in memory and sliced.

use futures::try_join;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    document::DocumentSnapshot,
    error::DocumentStoreResult,
    executor::QueryExecutor,
    merger::ResultMerger,
    page::{Page, Paginator},
    query::{Expr, Query},
    translate::{Translation, Translator},
};

/// Emulates MongoDB-style filtering, ordering and pagination over a backend.
///
/// The adapter owns nothing but its backend handle; pass `&backend` or an `Arc` to
/// share one backend between adapters.
///
/// # Example
///
/// ```ignore
/// use firelayer::{adapter::QueryAdapter, query::{Filter, Query, SortDirection}};
///
/// let adapter = QueryAdapter::new(&backend);
/// let page = adapter
///     .query(
///         "blogs",
///         &Query::builder()
///             .filter(Filter::eq("status", "pending"))
///             .sort("admin_review.requested_at", SortDirection::Desc)
///             .limit(10)
///             .build(),
///     )
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct QueryAdapter<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> QueryAdapter<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn translate(&self, filter: Option<&Expr>) -> Translation {
        Translator::new(self.backend.supports_membership()).translate(filter)
    }

    /// Returns one page of matching documents plus the total number of matches.
    ///
    /// # Errors
    ///
    /// `InvalidQuery` for a zero limit; backend errors other than a missing index are
    /// returned unchanged.
    pub async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> DocumentStoreResult<Page<DocumentSnapshot>> {
        query.validate()?;

        let paginator = Paginator::new(query.offset, query.limit);

        match self.translate(query.filter.as_ref()) {
            Translation::Single(branch) if branch.is_native() => {
                debug!(collection, "running native query");

                let executor = QueryExecutor::new(&self.backend);
                let (output, total) = try_join!(
                    executor.execute(collection, &branch, query.sort.as_ref(), paginator),
                    executor.count(collection, &branch),
                )?;

                Ok(Page::builder(output.documents)
                    .with_total(total)
                    .with_skip(paginator.skip)
                    .with_limit(paginator.limit)
                    .build())
            }
            translation => {
                debug!(collection, branches = translation.branches().len(), "running merged query");

                ResultMerger::new(&self.backend)
                    .query(collection, translation.branches(), query.sort.as_ref(), paginator)
                    .await
            }
        }
    }

    /// Returns one page of matching documents without computing the total.
    pub async fn find(
        &self,
        collection: &str,
        query: &Query,
    ) -> DocumentStoreResult<Vec<DocumentSnapshot>> {
        query.validate()?;

        let paginator = Paginator::new(query.offset, query.limit);

        match self.translate(query.filter.as_ref()) {
            Translation::Single(branch) => Ok(QueryExecutor::new(&self.backend)
                .execute(collection, &branch, query.sort.as_ref(), paginator)
                .await?
                .documents),
            Translation::Union(branches) => Ok(ResultMerger::new(&self.backend)
                .query(collection, &branches, query.sort.as_ref(), paginator)
                .await?
                .items),
        }
    }

    /// Counts the documents matching `filter`; `None` counts the whole collection.
    pub async fn count(&self, collection: &str, filter: Option<&Expr>) -> DocumentStoreResult<usize> {
        match self.translate(filter) {
            Translation::Single(branch) => {
                QueryExecutor::new(&self.backend)
                    .count(collection, &branch)
                    .await
            }
            Translation::Union(branches) => {
                ResultMerger::new(&self.backend)
                    .count(collection, &branches)
                    .await
            }
        }
    }
}
