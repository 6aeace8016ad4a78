//! Emulation of disjunctive filters by merging per-branch queries.
//!
//! Each branch is fetched in full, unordered and unlimited, because a single ordering
//! has to apply across the union. Branch results are merged in declaration order and
//! de-duplicated by identity: the first copy of a document wins, even if a later
//! branch observed different field values. The union is then sorted once and sliced.
//!
//! Branches run concurrently. Any branch failure fails the whole call.

use std::collections::HashSet;

use futures::future::try_join_all;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    document::{DOCUMENT_ID, DocumentSnapshot},
    error::DocumentStoreResult,
    executor::QueryExecutor,
    order::sort_snapshots,
    page::{Page, Paginator},
    query::{Sort, SortDirection},
    translate::Branch,
};

#[derive(Debug)]
pub struct ResultMerger<'a, B: StoreBackend> {
    executor: QueryExecutor<'a, B>,
}

impl<'a, B: StoreBackend> ResultMerger<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { executor: QueryExecutor::new(backend) }
    }

    async fn fetch_branches(
        &self,
        collection: &str,
        branches: &[Branch],
    ) -> DocumentStoreResult<Vec<Vec<DocumentSnapshot>>> {
        debug!(collection, branches = branches.len(), "fetching union branches");

        try_join_all(
            branches
                .iter()
                .map(|branch| self.executor.fetch_all(collection, branch)),
        )
        .await
    }

    /// Returns the de-duplicated union of all branches, first occurrence first.
    pub async fn union(
        &self,
        collection: &str,
        branches: &[Branch],
    ) -> DocumentStoreResult<Vec<DocumentSnapshot>> {
        let mut seen = HashSet::new();
        let mut merged = Vec::new();

        for documents in self.fetch_branches(collection, branches).await? {
            for document in documents {
                if seen.insert(document.id.clone()) {
                    merged.push(document);
                }
            }
        }

        Ok(merged)
    }

    /// Returns the sorted, paginated union together with its total size.
    pub async fn query(
        &self,
        collection: &str,
        branches: &[Branch],
        sort: Option<&Sort>,
        paginator: Paginator,
    ) -> DocumentStoreResult<Page<DocumentSnapshot>> {
        let order = sort
            .cloned()
            .unwrap_or_else(|| Sort::new(DOCUMENT_ID, SortDirection::Asc));

        let mut merged = self.union(collection, branches).await?;
        let total = merged.len();
        sort_snapshots(&mut merged, Some(&order));

        Ok(Page::builder(paginator.slice_sorted(merged))
            .with_total(total)
            .with_skip(paginator.skip)
            .with_limit(paginator.limit)
            .build())
    }

    /// Counts the distinct documents matched by any branch.
    pub async fn count(&self, collection: &str, branches: &[Branch]) -> DocumentStoreResult<usize> {
        Ok(self
            .fetch_branches(collection, branches)
            .await?
            .into_iter()
            .flatten()
            .map(|document| document.id)
            .collect::<HashSet<_>>()
            .len())
    }
}
