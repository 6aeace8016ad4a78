//! Main firelayer crate providing MongoDB-style queries over Firestore-like stores.
//!
//! This crate is the primary entry point. It re-exports the query layer from
//! `firelayer-core`, the in-memory backend, store configuration and the blog/image
//! repositories built on top of them.
//!
//! # Features
//!
//! - **MongoDB-style filters** - Equality, `$in`, `$exists` and `$or` over engines that only evaluate conjunctions
//! - **Index-missing fallback** - Ordered queries keep working, sorted in memory, while a composite index is being built
//! - **Offset pagination** - Skip/limit windows with totals, even though the engine cannot skip
//! - **Typed documents** - Define records with Serde and store them as schema-less maps
//!
//! # Quick Start
//!
//! ```ignore
//! use firelayer::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Image {
//!     pub owner_id: String,
//!     pub image_url: String,
//!     pub source: Option<String>,
//! }
//!
//! impl Document for Image {
//!     fn collection_name() -> &'static str { "images" }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let images = store.typed_collection::<Image>();
//!
//!     images
//!         .add(&Image { owner_id: "u1".into(), image_url: "https://cdn/a.png".into(), source: None })
//!         .await?;
//!
//!     let page = images
//!         .query(
//!             &Query::builder()
//!                 .filter(Filter::eq("owner_id", "u1").and(Filter::or([
//!                     Filter::eq("source", "nano"),
//!                     Filter::not_exists("source"),
//!                 ])))
//!                 .sort("image_url", SortDirection::Asc)
//!                 .limit(24)
//!                 .build(),
//!         )
//!         .await?;
//!
//!     println!("{} of {} images", page.items.len(), page.total);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Dictionary filters
//!
//! Handlers that receive MongoDB-style filter dictionaries parse them once with
//! [`Expr::from_mongo`](query::Expr::from_mongo):
//!
//! ```ignore
//! let filter = Expr::from_mongo(&bson::doc! {
//!     "owner_id": "u1",
//!     "$or": [
//!         { "source": { "$in": ["nano", "blog"] } },
//!         { "source": { "$exists": false } },
//!     ],
//! })?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory store that enforces composite index rules, for development and testing

pub mod cms;
pub mod config;
pub mod prelude;

pub use firelayer_core::{
    adapter, backend, collection, document, error, executor, merger, order, page, query, store, translate,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use firelayer_memory::{CompositeIndex, InMemoryStore, InMemoryStoreBuilder};
}
