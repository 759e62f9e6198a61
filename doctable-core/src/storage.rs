//! Storage abstraction for the document store.
//!
//! A [`Storage`] persists the whole database state as one JSON-compatible value: table
//! name to document ID to document body. Tables read that state, change their part of it
//! and write it back; the storage never interprets the documents.
//!
//! # Overview
//!
//! The trait is deliberately small. Implementations only have to:
//!
//! - return the last written state, or `None` if nothing has been written yet
//! - replace the stored state with a new one
//! - optionally release resources on [`close`](Storage::close)
//!
//! Storages are shared by every table of a database, so all methods take `&self` and
//! implementations must be thread-safe (`Send + Sync`). Wrapping storages compose: a
//! storage can hold another one (for example behind an `Arc<dyn Storage>`) and delegate to
//! it, adding caching, logging or encoding along the way.
//!
//! # Examples
//!
//! ```ignore
//! use doctable::storage::{Storage, StoreMap};
//!
//! let storage = MemoryStorage::new();
//! assert!(storage.read()?.is_none());
//!
//! storage.write(StoreMap::new())?;
//! assert_eq!(storage.read()?, Some(StoreMap::new()));
//! ```

use serde_json::Value;
use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use crate::error::DocumentStoreResult;

/// Documents of one table, keyed by the decimal form of their ID.
pub type TableMap = BTreeMap<String, Value>;

/// The whole database state, keyed by table name.
pub type StoreMap = BTreeMap<String, TableMap>;

/// Abstract interface for storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe. The exact concurrency model is up to the
/// implementer, but a `read` that follows a completed `write` must observe it.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Backend failures should be reported as
/// [`DocumentStoreError::Storage`](crate::error::DocumentStoreError::Storage) and are passed
/// through to the caller untouched.
pub trait Storage: Send + Sync + Debug {
    /// Reads the current state.
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if the storage is empty (nothing was ever written), otherwise the
    /// last written state.
    fn read(&self) -> DocumentStoreResult<Option<StoreMap>>;

    /// Replaces the stored state.
    ///
    /// # Arguments
    ///
    /// * `data` - The complete new state. Tables absent from it no longer exist.
    fn write(&self, data: StoreMap) -> DocumentStoreResult<()>;

    /// Releases any resources held by the storage.
    ///
    /// The default implementation does nothing. Storages backed by files or connections
    /// should override it. Using a storage after closing it is implementation-defined.
    fn close(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

impl<S> Storage for Arc<S>
where
    S: Storage + ?Sized,
{
    fn read(&self) -> DocumentStoreResult<Option<StoreMap>> {
        (**self).read()
    }

    fn write(&self, data: StoreMap) -> DocumentStoreResult<()> {
        (**self).write(data)
    }

    fn close(&self) -> DocumentStoreResult<()> {
        (**self).close()
    }
}

impl<S> Storage for Box<S>
where
    S: Storage + ?Sized,
{
    fn read(&self) -> DocumentStoreResult<Option<StoreMap>> {
        (**self).read()
    }

    fn write(&self, data: StoreMap) -> DocumentStoreResult<()> {
        (**self).write(data)
    }

    fn close(&self) -> DocumentStoreResult<()> {
        (**self).close()
    }
}

/// Factory trait for storages that need configuration before use.
pub trait StorageBuilder {
    /// The storage type produced by this builder.
    type Storage: Storage;

    /// Builds the storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage could not be initialized.
    fn build(self) -> DocumentStoreResult<Self::Storage>;
}
