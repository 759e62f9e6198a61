//! Convenient re-exports of commonly used types from doctable.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and functions without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use doctable::prelude::*;
//! ```

pub use doctable_core::{
    config::{CacheCapacity, DatabaseConfig, TableConfig},
    database::Database,
    document::{DocId, Document, Fields, NewDocument},
    error::{DocumentStoreError, DocumentStoreResult},
    operations::{add, decrement, delete, increment, set, subtract, Update},
    query::{field, Query, QueryInstance},
    storage::{Storage, StorageBuilder, StoreMap, TableMap},
    table::Table,
};
