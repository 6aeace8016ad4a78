//! MongoDB-style querying for Firestore-like document stores.
//!
//! Firestore-like engines only evaluate conjunctions of equality and membership
//! predicates, need pre-declared composite indexes to filter and order on different
//! fields, and cannot skip. This crate layers the missing pieces on top:
//!
//! - **Filters** ([`query`]) - `Expr` sum type (`Eq`, `In`, `Exists`, `Or`, `And`) and a parser for the MongoDB dictionary dialect
//! - **Filter translation** ([`translate`]) - Rewrites filters into native predicate branches plus in-memory post-filters
//! - **Query execution** ([`executor`]) - Ordered, limited native queries with an in-memory fallback when an index is missing
//! - **Result merging** ([`merger`]) - `$or` emulation by de-duplicated union of branch queries
//! - **Pagination** ([`page`]) - Skip/limit windows and result pages
//! - **Query adapter** ([`adapter`]) - The entry point request handlers call
//! - **Backend abstraction** ([`backend`]) - Trait implemented by concrete engines
//! - **Documents, collections and store** ([`document`], [`collection`], [`store`])
//! - **Error handling** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use firelayer::prelude::*;
//!
//! let store = DocumentStore::new(backend);
//! let page = store
//!     .collection("images")
//!     .query(
//!         &Query::builder()
//!             .filter(Filter::eq("owner_id", "u1").and(Filter::or([
//!                 Filter::is_in("source", ["nano", "blog"]),
//!                 Filter::not_exists("source"),
//!             ])))
//!             .sort("created_at", SortDirection::Desc)
//!             .limit(24)
//!             .build(),
//!     )
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as firelayer_core;

pub mod adapter;
pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod merger;
pub mod order;
pub mod page;
pub mod query;
pub mod store;
pub mod translate;
pub mod value;
