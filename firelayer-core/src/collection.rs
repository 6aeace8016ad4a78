//! Collection views over a backend.
//!
//! - [`Collection`] - Untyped collection working with raw field maps and snapshots
//! - [`TypedCollection`] - Collection bound to a [`Document`] type
//!
//! # Example
//!
//! ```ignore
//! let images = store.typed_collection::<Image>();
//! let id = images.add(&image).await?;
//! let page = images.query(&Query::builder().filter(Filter::eq("owner_id", "u1")).limit(24).build()).await?;
//! ```

use std::marker::PhantomData;

use bson::Document as BsonDocument;

use crate::{
    adapter::QueryAdapter,
    backend::StoreBackend,
    document::{Document, DocumentExt, DocumentSnapshot},
    error::DocumentStoreResult,
    page::Page,
    query::{Expr, Query},
};

/// A typed record together with its backend-assigned identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<D> {
    pub id: String,
    pub document: D,
}

impl<D: Document> Record<D> {
    fn from_snapshot(snapshot: DocumentSnapshot) -> DocumentStoreResult<Self> {
        Ok(Self {
            id: snapshot.id,
            document: D::from_fields(snapshot.data)?,
        })
    }
}

/// An untyped collection with a reference to a storage backend.
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn adapter(&self) -> QueryAdapter<&'a B> {
        QueryAdapter::new(self.backend)
    }

    /// Creates a document and returns its backend-assigned identity.
    pub async fn add(&self, data: BsonDocument) -> DocumentStoreResult<String> {
        self.backend.add_document(&self.name, data).await
    }

    /// Creates or replaces the document with the given identity.
    pub async fn set(&self, id: &str, data: BsonDocument) -> DocumentStoreResult<()> {
        self.backend.set_document(&self.name, id, data).await
    }

    /// Reads a document by identity.
    pub async fn get(&self, id: &str) -> DocumentStoreResult<Option<DocumentSnapshot>> {
        self.backend.get_document(&self.name, id).await
    }

    /// Applies a partial update; see [`StoreBackend::update_document`].
    pub async fn update(&self, id: &str, updates: BsonDocument) -> DocumentStoreResult<()> {
        self.backend.update_document(&self.name, id, updates).await
    }

    /// Deletes a document by identity.
    pub async fn delete(&self, id: &str) -> DocumentStoreResult<()> {
        self.backend.delete_document(&self.name, id).await
    }

    /// Returns a page of matching documents and the total match count.
    pub async fn query(&self, query: &Query) -> DocumentStoreResult<Page<DocumentSnapshot>> {
        self.adapter().query(&self.name, query).await
    }

    /// Returns a page of matching documents without the total.
    pub async fn find(&self, query: &Query) -> DocumentStoreResult<Vec<DocumentSnapshot>> {
        self.adapter().find(&self.name, query).await
    }

    /// Returns the first document in query order, if any.
    pub async fn find_one(&self, filter: Expr) -> DocumentStoreResult<Option<DocumentSnapshot>> {
        Ok(self
            .find(&Query::builder().filter(filter).limit(1).build())
            .await?
            .into_iter()
            .next())
    }

    /// Counts matching documents.
    pub async fn count(&self, filter: Option<&Expr>) -> DocumentStoreResult<usize> {
        self.adapter().count(&self.name, filter).await
    }
}

/// A collection bound to the document type `D`.
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    inner: Collection<'a, B>,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { inner: Collection::new(name, backend), _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the untyped view of the same collection.
    pub fn untyped(&self) -> &Collection<'a, B> {
        &self.inner
    }

    /// Serializes and creates a document, returning its identity.
    pub async fn add(&self, document: &D) -> DocumentStoreResult<String> {
        self.inner.add(document.to_fields()?).await
    }

    /// Serializes and stores a document under the given identity.
    pub async fn set(&self, id: &str, document: &D) -> DocumentStoreResult<()> {
        self.inner.set(id, document.to_fields()?).await
    }

    /// Reads and deserializes a document by identity.
    pub async fn get(&self, id: &str) -> DocumentStoreResult<Option<Record<D>>> {
        self.inner
            .get(id)
            .await?
            .map(Record::from_snapshot)
            .transpose()
    }

    /// Applies a partial update to a document.
    pub async fn update(&self, id: &str, updates: BsonDocument) -> DocumentStoreResult<()> {
        self.inner.update(id, updates).await
    }

    /// Deletes a document by identity.
    pub async fn delete(&self, id: &str) -> DocumentStoreResult<()> {
        self.inner.delete(id).await
    }

    /// Returns a page of deserialized documents and the total match count.
    pub async fn query(&self, query: &Query) -> DocumentStoreResult<Page<Record<D>>> {
        self.inner
            .query(query)
            .await?
            .map_items(Record::from_snapshot)
    }

    /// Returns the first matching document in query order, if any.
    pub async fn find_one(&self, filter: Expr) -> DocumentStoreResult<Option<Record<D>>> {
        self.inner
            .find_one(filter)
            .await?
            .map(Record::from_snapshot)
            .transpose()
    }

    /// Counts matching documents.
    pub async fn count(&self, filter: Option<&Expr>) -> DocumentStoreResult<usize> {
        self.inner.count(filter).await
    }
}
