//! Document store: the owner of a backend handle.
//!
//! A [`DocumentStore`] is constructed once by the process around an explicitly built
//! backend and passed to whatever needs it. There is no global client.
//!
//! # Example
//!
//! ```ignore
//! use firelayer::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend);
//! let blogs = store.collection("blogs");
//! let total = blogs.count(None).await?;
//! ```

use crate::{
    adapter::QueryAdapter,
    backend::StoreBackend,
    collection::{Collection, TypedCollection},
    document::Document,
};

#[derive(Debug, Clone)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns a query adapter borrowing this store's backend.
    pub fn adapter(&self) -> QueryAdapter<&B> {
        QueryAdapter::new(&self.backend)
    }

    /// Gets an untyped collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// Gets a typed collection named by `D::collection_name()`.
    pub fn typed_collection<'a, D: Document>(&'a self) -> TypedCollection<'a, B, D> {
        TypedCollection::new(D::collection_name().to_string(), &self.backend)
    }

    /// Gets a typed collection under an explicit name.
    pub fn typed_collection_named<'a, D: Document>(&'a self, name: &str) -> TypedCollection<'a, B, D> {
        TypedCollection::new(name.to_string(), &self.backend)
    }

    /// Consumes the store and returns the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }
}
