//! In-memory storage for doctable.
//!
//! This crate provides a thread-safe, in-memory implementation of the `Storage` trait.
//! It is the storage used by tests and the natural choice for short-lived databases.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes through a read-write lock
//! - **Shared state** - Clones of a storage see the same data
//! - **Seeding** - The builder can start a storage from existing state or JSON
//!
//! # Quick Start
//!
//! ```ignore
//! use doctable::{database::Database, memory::MemoryStorage};
//! use serde_json::json;
//!
//! let mut db = Database::new(MemoryStorage::new());
//! let id = db.insert(json!({"name": "Alice"}))?;
//!
//! assert_eq!(db.get_by_id(id)?.unwrap()["name"], "Alice");
//! ```

#[allow(unused_extern_crates)]
extern crate self as doctable_memory;

pub mod store;

pub use store::{MemoryStorage, MemoryStorageBuilder};
