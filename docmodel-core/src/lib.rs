//! Core of the docmodel object-document mapper.
//!
//! docmodel maps schemaless documents to entity types and queries them through
//! lazy, chainable query sets with Django-style lookups. This crate provides:
//!
//! - **Entity types and instances** ([`document`], [`options`], [`registration`])
//! - **Managers** ([`manager`]) - Per-type entry point for queries, creation, upserts and indexes
//! - **Query sets** ([`queryset`]) - Lazy filter/order/slice pipelines evaluated on demand
//! - **Lookups and ordering** ([`lookup`], [`ordering`]) - Translation of `field__op` keys and `-field` orderings
//! - **Backend-neutral queries** ([`query`]) and their store-native rendering ([`native`])
//! - **Index descriptors** ([`index`])
//! - **Store backend abstraction** ([`backend`], [`collection`], [`connection`], [`settings`])
//! - **Error handling** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! #[derive(Entity)]
//! #[entity(collection = "albums", unique_index = "slug")]
//! pub struct Album;
//!
//! let albums = register::<Album>(&connections).await?;
//! albums.create(doc! { "slug": "reign-in-blood", "year": 1986 }).await?;
//!
//! let eighties = albums
//!     .filter(doc! { "year__gte": 1980, "year__lt": 1990 })
//!     .order_by(["-year"])
//!     .fetch()
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod collection;
pub mod connection;
pub mod document;
pub mod error;
pub mod index;
pub mod lookup;
pub mod manager;
pub mod native;
pub mod options;
pub mod ordering;
pub mod query;
pub mod queryset;
pub mod registration;
pub mod settings;
