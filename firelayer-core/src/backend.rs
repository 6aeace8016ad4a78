//! Storage backend abstraction.
//!
//! The [`StoreBackend`] trait models a Firestore-like engine: a query is a conjunction
//! of native equality/membership predicates, an optional ordering on one field and an
//! optional limit. There is no native offset, no disjunction and no "field absent"
//! predicate; the [`executor`](crate::executor) and [`merger`](crate::merger) emulate
//! those on top of this trait.
//!
//! A backend that cannot serve a filtered and ordered query without a pre-declared
//! composite index must fail with
//! [`DocumentStoreError::IndexMissing`](crate::error::DocumentStoreError::IndexMissing).
//!
//! # Examples
//!
//! ```ignore
//! use firelayer::backend::{NativeQuery, StoreBackend};
//! use firelayer::translate::Predicate;
//! use bson::doc;
//!
//! let id = backend.add_document("images", doc! { "owner_id": "u1" }).await?;
//! let docs = backend
//!     .run_query("images", NativeQuery::new(vec![Predicate::eq("owner_id", "u1")]))
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use bson::Document as BsonDocument;

use crate::{
    document::DocumentSnapshot,
    error::DocumentStoreResult,
    query::Sort,
    translate::Predicate,
};

/// A query the backend executes natively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeQuery {
    /// Conjunction of native predicates.
    pub predicates: Vec<Predicate>,
    /// Server-side ordering. Ties are broken by document identity in the same direction.
    pub order: Option<Sort>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl NativeQuery {
    /// Creates an unordered, unlimited query over the given predicates.
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates, order: None, limit: None }
    }

    pub fn order_by(mut self, order: Sort) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Abstract interface for Firestore-like document backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; many queries may be in flight at once and
/// the query layer shares no mutable state between them.
///
/// # Error Handling
///
/// Transport failures should surface as
/// [`DocumentStoreError::Unavailable`](crate::error::DocumentStoreError::Unavailable) and
/// missing composite indexes as
/// [`DocumentStoreError::IndexMissing`](crate::error::DocumentStoreError::IndexMissing).
/// The query layer never retries.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Executes a native query against a collection.
    ///
    /// A missing collection behaves like an empty one.
    async fn run_query(
        &self,
        collection: &str,
        query: NativeQuery,
    ) -> DocumentStoreResult<Vec<DocumentSnapshot>>;

    /// Counts the documents matching a conjunction of native predicates.
    ///
    /// The default implementation runs an unordered query and counts the results.
    async fn count_documents(
        &self,
        collection: &str,
        predicates: Vec<Predicate>,
    ) -> DocumentStoreResult<usize> {
        Ok(self
            .run_query(collection, NativeQuery::new(predicates))
            .await?
            .len())
    }

    /// Returns `true` if the backend evaluates membership (`In`) predicates natively.
    ///
    /// When `false`, membership filters are expanded into one query per value.
    fn supports_membership(&self) -> bool {
        true
    }

    /// Creates a document with a backend-assigned identity and returns that identity.
    async fn add_document(&self, collection: &str, data: BsonDocument) -> DocumentStoreResult<String>;

    /// Creates or replaces the document with the given identity.
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: BsonDocument,
    ) -> DocumentStoreResult<()>;

    /// Reads a document by identity.
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<DocumentSnapshot>>;

    /// Applies a partial update to an existing document.
    ///
    /// Keys containing dots address nested fields (`"admin_review.reviewed_at"`), and
    /// nested maps are merged field by field rather than replacing the whole map.
    ///
    /// # Errors
    ///
    /// Fails with `DocumentNotFound` if the document does not exist.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        updates: BsonDocument,
    ) -> DocumentStoreResult<()>;

    /// Deletes a document. Deleting a missing document succeeds.
    async fn delete_document(&self, collection: &str, id: &str) -> DocumentStoreResult<()>;
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn run_query(
        &self,
        collection: &str,
        query: NativeQuery,
    ) -> DocumentStoreResult<Vec<DocumentSnapshot>> {
        (*self).run_query(collection, query).await
    }

    async fn count_documents(
        &self,
        collection: &str,
        predicates: Vec<Predicate>,
    ) -> DocumentStoreResult<usize> {
        (*self).count_documents(collection, predicates).await
    }

    fn supports_membership(&self) -> bool {
        (*self).supports_membership()
    }

    async fn add_document(&self, collection: &str, data: BsonDocument) -> DocumentStoreResult<String> {
        (*self).add_document(collection, data).await
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: BsonDocument,
    ) -> DocumentStoreResult<()> {
        (*self).set_document(collection, id, data).await
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<DocumentSnapshot>> {
        (*self).get_document(collection, id).await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        updates: BsonDocument,
    ) -> DocumentStoreResult<()> {
        (*self).update_document(collection, id, updates).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> DocumentStoreResult<()> {
        (*self).delete_document(collection, id).await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend,
{
    async fn run_query(
        &self,
        collection: &str,
        query: NativeQuery,
    ) -> DocumentStoreResult<Vec<DocumentSnapshot>> {
        (**self).run_query(collection, query).await
    }

    async fn count_documents(
        &self,
        collection: &str,
        predicates: Vec<Predicate>,
    ) -> DocumentStoreResult<usize> {
        (**self).count_documents(collection, predicates).await
    }

    fn supports_membership(&self) -> bool {
        (**self).supports_membership()
    }

    async fn add_document(&self, collection: &str, data: BsonDocument) -> DocumentStoreResult<String> {
        (**self).add_document(collection, data).await
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: BsonDocument,
    ) -> DocumentStoreResult<()> {
        (**self).set_document(collection, id, data).await
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<DocumentSnapshot>> {
        (**self).get_document(collection, id).await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        updates: BsonDocument,
    ) -> DocumentStoreResult<()> {
        (**self).update_document(collection, id, updates).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> DocumentStoreResult<()> {
        (**self).delete_document(collection, id).await
    }
}

/// Factory for backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
