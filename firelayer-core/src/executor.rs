//! Execution of a single translated branch against a backend.
//!
//! A native branch is sent as one ordered query limited to `skip + limit`, and the
//! first `skip` results are dropped locally. If the backend reports a missing
//! composite index, the executor logs a warning and falls back to fetching every
//! match unordered, sorting in memory and slicing the same window. Both paths order
//! with [`compare_snapshots`](crate::order::compare_snapshots), so they return the
//! same documents in the same order.
//!
//! Branches with post-filters cannot push ordering or limits to the backend (the
//! post-filter would shrink the window), so they always take the in-memory path.

use tracing::{debug, error, warn};

use crate::{
    backend::{NativeQuery, StoreBackend},
    document::{DOCUMENT_ID, DocumentSnapshot},
    error::{DocumentStoreError, DocumentStoreResult},
    order::sort_snapshots,
    page::Paginator,
    query::{Sort, SortDirection},
    translate::Branch,
};

/// Documents returned by [`QueryExecutor::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorOutput {
    /// The requested window, in order.
    pub documents: Vec<DocumentSnapshot>,
    /// `true` if the backend applied the ordering, `false` if it was done in memory.
    pub server_ordered: bool,
}

/// Runs branches against a backend.
#[derive(Debug)]
pub struct QueryExecutor<'a, B: StoreBackend> {
    backend: &'a B,
}

impl<'a, B: StoreBackend> QueryExecutor<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Returns the `paginator` window of the branch's matches ordered by `sort`.
    ///
    /// Without a sort, results are ordered by identity ascending.
    ///
    /// # Errors
    ///
    /// Backend errors other than a missing index are returned unchanged.
    pub async fn execute(
        &self,
        collection: &str,
        branch: &Branch,
        sort: Option<&Sort>,
        paginator: Paginator,
    ) -> DocumentStoreResult<ExecutorOutput> {
        let order = sort
            .cloned()
            .unwrap_or_else(|| Sort::new(DOCUMENT_ID, SortDirection::Asc));

        if !branch.is_native() {
            return Ok(ExecutorOutput {
                documents: self.sorted_window(collection, branch, &order, paginator).await?,
                server_ordered: false,
            });
        }

        let mut query = NativeQuery::new(branch.predicates.clone()).order_by(order.clone());
        if let Some(limit) = paginator.native_limit() {
            query = query.limit(limit);
        }

        match self.backend.run_query(collection, query).await {
            Ok(documents) => Ok(ExecutorOutput {
                documents: paginator.slice_prefetched(documents),
                server_ordered: true,
            }),
            Err(DocumentStoreError::IndexMissing { message, .. }) => {
                warn!(
                    collection,
                    order_by = %order.field,
                    %message,
                    "composite index missing, falling back to in-memory sort"
                );

                Ok(ExecutorOutput {
                    documents: self.sorted_window(collection, branch, &order, paginator).await?,
                    server_ordered: false,
                })
            }
            Err(err) => {
                error!(collection, order_by = %order.field, error = %err, "query failed");
                Err(err)
            }
        }
    }

    /// Fetches every document matching the branch, unordered, with post-filters applied.
    pub async fn fetch_all(
        &self,
        collection: &str,
        branch: &Branch,
    ) -> DocumentStoreResult<Vec<DocumentSnapshot>> {
        let documents = self
            .backend
            .run_query(collection, NativeQuery::new(branch.predicates.clone()))
            .await
            .inspect_err(|err| error!(collection, error = %err, "unordered fetch failed"))?;

        let fetched = documents.len();
        let documents = documents
            .into_iter()
            .filter(|document| branch.post_filter(document))
            .collect::<Vec<_>>();

        debug!(collection, fetched, kept = documents.len(), "fetched branch candidates");

        Ok(documents)
    }

    /// Counts the documents matching the branch.
    pub async fn count(&self, collection: &str, branch: &Branch) -> DocumentStoreResult<usize> {
        if branch.is_native() {
            return self
                .backend
                .count_documents(collection, branch.predicates.clone())
                .await
                .inspect_err(|err| error!(collection, error = %err, "count failed"));
        }

        Ok(self.fetch_all(collection, branch).await?.len())
    }

    async fn sorted_window(
        &self,
        collection: &str,
        branch: &Branch,
        order: &Sort,
        paginator: Paginator,
    ) -> DocumentStoreResult<Vec<DocumentSnapshot>> {
        let mut documents = self.fetch_all(collection, branch).await?;
        sort_snapshots(&mut documents, Some(order));

        Ok(paginator.slice_sorted(documents))
    }
}
