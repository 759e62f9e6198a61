//! In-memory storage implementation.
//!
//! This module provides a storage that keeps the database state in a `BTreeMap` behind a
//! read-write lock. Nothing survives the process.

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

use doctable_core::{
    error::DocumentStoreResult,
    storage::{Storage, StorageBuilder, StoreMap},
};

/// Thread-safe in-memory storage.
///
/// # Thread Safety
///
/// `MemoryStorage` is cloneable and keeps its state behind an `Arc`, so every clone
/// shares the same data. Reads take a shared lock and return a copy of the state;
/// writes replace it under an exclusive lock.
///
/// # Example
///
/// ```ignore
/// use doctable_memory::MemoryStorage;
/// use doctable::storage::{Storage, StoreMap};
///
/// let storage = MemoryStorage::new();
/// assert!(storage.read()?.is_none());
///
/// storage.write(StoreMap::new())?;
/// assert!(storage.clone().read()?.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct MemoryStorage {
    /// The last written state, `None` until the first write
    data: Arc<RwLock<Option<StoreMap>>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self { data: Arc::new(RwLock::new(None)) }
    }

    /// Creates a builder for a storage with initial contents.
    pub fn builder() -> MemoryStorageBuilder {
        MemoryStorageBuilder::default()
    }

    /// Returns the current state as a JSON value, or `Value::Null` if nothing has been
    /// written yet.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`](doctable_core::error::DocumentStoreError::Serialization)
    /// if the state cannot be represented as JSON.
    pub fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(serde_json::to_value(&*self.data.read())?)
    }
}

impl Storage for MemoryStorage {
    fn read(&self) -> DocumentStoreResult<Option<StoreMap>> {
        let data = self.data.read().clone();
        trace!(target: "doctable::memory", tables = data.as_ref().map_or(0, |tables| tables.len()), "Read state");
        Ok(data)
    }

    fn write(&self, data: StoreMap) -> DocumentStoreResult<()> {
        trace!(target: "doctable::memory", tables = data.len(), "Wrote state");
        *self.data.write() = Some(data);
        Ok(())
    }
}

/// Builder for constructing [`MemoryStorage`] instances.
///
/// # Example
///
/// ```ignore
/// use doctable_memory::MemoryStorage;
/// use doctable::storage::StorageBuilder;
/// use serde_json::json;
///
/// let storage = MemoryStorage::builder()
///     .with_json(json!({"_default": {"1": {"name": "a"}}}))?
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorageBuilder {
    data: Option<StoreMap>,
}

impl MemoryStorageBuilder {
    /// Starts the storage with `data` instead of empty.
    pub fn with_data(mut self, data: StoreMap) -> Self {
        self.data = Some(data);
        self
    }

    /// Starts the storage with a state given as JSON, in the layout described in
    /// [`doctable_core::storage`].
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`](doctable_core::error::DocumentStoreError::Serialization)
    /// if `value` is not an object of objects.
    pub fn with_json(self, value: Value) -> DocumentStoreResult<Self> {
        let data = serde_json::from_value::<StoreMap>(value)?;
        Ok(self.with_data(data))
    }
}

impl StorageBuilder for MemoryStorageBuilder {
    type Storage = MemoryStorage;

    /// Builds the storage. This always succeeds.
    fn build(self) -> DocumentStoreResult<Self::Storage> {
        Ok(MemoryStorage { data: Arc::new(RwLock::new(self.data)) })
    }
}
