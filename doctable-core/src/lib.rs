//! A small embedded JSON document database.
//!
//! This crate is the core of the doctable project and provides:
//!
//! - **Documents** ([`document`]) - JSON objects tagged with integer IDs
//! - **Storage abstraction** ([`storage`]) - The trait storages implement to persist the database state
//! - **Query API** ([`query`]) - Composable, hashable predicates over documents
//! - **Tables** ([`table`]) - CRUD over one named table, with a query result cache
//! - **Database** ([`database`]) - Named tables sharing one storage
//! - **Update operations** ([`operations`]) - Field-level transforms for updates
//! - **Caching** ([`cache`]) - The least-recently-used cache behind table queries
//! - **Configuration** ([`config`]) - Cache capacity and default table settings
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use doctable_core::{database::Database, query::field};
//! use serde_json::json;
//!
//! let mut db = Database::new(storage);
//! let users = db.table("users");
//!
//! users.insert_multiple([json!({"name": "a", "age": 30}), json!({"name": "b", "age": 17})])?;
//! let adults = users.search(&field("age").ge(18))?;
//!
//! assert_eq!(adults.len(), 1);
//! assert_eq!(adults[0].doc_id(), 1);
//! ```

#[allow(unused_extern_crates)]
extern crate self as doctable_core;

pub mod cache;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod operations;
pub mod query;
pub mod storage;
pub mod table;
mod value;

pub use value::Frozen;
