//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development
//! and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Store query semantics** - Lookups, multi-key sorting and windows behave like a document store
//! - **Index bookkeeping** - Indexes are reported back and unique indexes are enforced
//! - **Operator updates** - `$set`, `$unset` and `$rename`, plus replacements and upserts
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{connection::Connections, memory::InMemoryStore};
//!
//! let connections = Connections::new()
//!     .with_backend("default", InMemoryStore::builder().build().await?);
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

pub mod store;
mod evaluator;
mod update;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
