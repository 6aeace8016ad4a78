//! Error types and result types for document store operations.
//!
//! This module provides error handling for every query and document operation.
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.
//!
//! Backends must report a missing composite index as
//! [`DocumentStoreError::IndexMissing`]. The query executor matches on that variant to
//! decide whether to fall back to an in-memory sort, so it must never be folded into
//! [`DocumentStoreError::Backend`].

use std::convert::Infallible;

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The document has an invalid structure (e.g. it is not a map).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The filter specification contains an unknown operator or a malformed shape.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    /// The query parameters are out of range (e.g. a zero limit).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// The backend needs a composite index to serve a filtered and ordered query.
    #[error("Missing composite index on collection {collection} ordered by {order_by}: {message}")]
    IndexMissing {
        /// The collection that was queried.
        collection: String,
        /// The field the query was ordered by.
        order_by: String,
        /// The backend's own description of the failure.
        message: String,
    },
    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DocumentStoreError {
    /// Returns `true` if this error signals a missing composite index.
    pub fn is_index_missing(&self) -> bool {
        matches!(self, DocumentStoreError::IndexMissing { .. })
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<Infallible> for DocumentStoreError {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}
