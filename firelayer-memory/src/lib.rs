//! In-memory Firestore-like backend for firelayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait
//! that enforces the same constraints a Firestore-like engine does, so the whole query
//! layer can be exercised without a network.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Composite index rules** - Filtered queries ordered on another field fail with `IndexMissing` unless an index is declared
//! - **Optional membership** - Native `in` predicates can be disabled to exercise per-value expansion
//! - **Field-path updates** - Dot-path and nested-map updates merge into existing documents
//!
//! # Quick Start
//!
//! ```ignore
//! use firelayer::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder()
//!         .with_composite_index("blogs", ["user_id"], "created_at")
//!         .build()
//!         .await?;
//!     let store = DocumentStore::new(backend);
//!
//!     store.collection("blogs").add(bson::doc! { "user_id": "u1", "created_at": 1 }).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as firelayer_memory;

pub mod store;

pub use store::{CompositeIndex, InMemoryStore, InMemoryStoreBuilder};
