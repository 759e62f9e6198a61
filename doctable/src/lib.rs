//! Main doctable crate: an embedded JSON document database.
//!
//! This crate is the primary entry point for users of doctable. It re-exports the core
//! types and functionality and provides access to the bundled storage.
//!
//! # Features
//!
//! - **Schemaless documents** - Store JSON objects, get them back tagged with integer IDs
//! - **Composable queries** - Build predicates from field paths and combine them with `&`, `|` and `!`
//! - **Query caching** - Repeated searches are answered from a per-table LRU cache
//! - **Pluggable storage** - Implement one small trait to persist the database anywhere
//!
//! # Quick Start
//!
//! ```ignore
//! use doctable::{prelude::*, memory::MemoryStorage};
//! use serde_json::json;
//!
//! let mut db = Database::new(MemoryStorage::new());
//! let users = db.table("users");
//!
//! users.insert_multiple([
//!     json!({"name": "Alice", "age": 31, "tags": ["admin"]}),
//!     json!({"name": "Bob", "age": 17, "tags": []}),
//! ])?;
//!
//! // Search with a composed query
//! let admins = users.search(&(field("age").ge(18) & field("tags").any(["admin"])))?;
//! assert_eq!(admins[0]["name"], "Alice");
//!
//! // Update with a field operation
//! users.update(increment("age"), &field("name").eq("Bob"))?;
//!
//! // Insert or update in one call
//! users.upsert(json!({"name": "Carol", "age": 40}), Some(&field("name").eq("Carol")))?;
//! # Ok::<(), DocumentStoreError>(())
//! ```
//!
//! # Storage
//!
//! Databases are generic over their [`Storage`](storage::Storage). Wrapping storages compose
//! through ordinary delegation, and `Arc<dyn Storage>` selects the storage at runtime:
//!
//! ```ignore
//! use doctable::{prelude::*, memory::MemoryStorage};
//! use std::sync::Arc;
//!
//! let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
//! let mut db = Database::from_shared(storage, DatabaseConfig::default());
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for tests and short-lived databases

pub mod prelude;

pub use doctable_core::{cache, config, database, document, error, operations, query, storage, table, Frozen};

// Re-export JSON types for convenience
pub use serde_json;

/// In-memory storage implementations.
pub mod memory {
    pub use doctable_memory::{MemoryStorage, MemoryStorageBuilder};
}
