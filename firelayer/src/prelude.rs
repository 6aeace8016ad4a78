//! Convenient re-exports of commonly used types from firelayer.
//!
//! ```ignore
//! use firelayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - Document traits and snapshots
//! - Store backends and builders
//! - Query construction and filtering
//! - Collections, pagination and the query adapter
//! - Error types

pub use firelayer_core::{
    adapter::QueryAdapter,
    backend::{StoreBackend, StoreBackendBuilder},
    collection::{Collection, Record, TypedCollection},
    document::{DOCUMENT_ID, Document, DocumentExt, DocumentSnapshot},
    error::{DocumentStoreError, DocumentStoreResult},
    page::{Page, PaginationParams},
    query::{Expr, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    store::DocumentStore,
};
