//! The database: a storage shared by named tables.
//!
//! [`Database`] is the main entry point. It owns the storage handle, opens tables on
//! demand and keeps them open so their query caches and ID counters survive between
//! calls. The most common table operations are also available directly on the database,
//! where they act on the default table.
//!
//! # Example
//!
//! ```ignore
//! use doctable::{database::Database, memory::MemoryStorage, query::field};
//! use serde_json::json;
//!
//! let mut db = Database::new(MemoryStorage::new());
//!
//! db.insert(json!({"kind": "default"}))?;
//! db.table("users").insert(json!({"name": "Alice"}))?;
//!
//! assert_eq!(db.tables()?, ["_default", "users"].map(String::from).into());
//! assert_eq!(db.table("users").count(&field("name").eq("Alice"))?, 1);
//! ```

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};
use tracing::debug;

use crate::{
    config::DatabaseConfig,
    document::{DocId, Document, NewDocument},
    error::DocumentStoreResult,
    operations::Update,
    query::QueryInstance,
    storage::{Storage, StoreMap},
    table::Table,
};

/// A document database over a [`Storage`].
///
/// # Type Parameters
///
/// * `S` - The storage implementation. Use `dyn Storage` to pick the storage at runtime.
#[derive(Debug)]
pub struct Database<S: Storage + ?Sized> {
    storage: Arc<S>,
    config: DatabaseConfig,
    tables: HashMap<String, Table<S>>,
}

impl<S: Storage> Database<S> {
    /// Creates a database over `storage` with the default configuration.
    pub fn new(storage: S) -> Self {
        Self::from_shared(Arc::new(storage), DatabaseConfig::default())
    }

    /// Creates a database over `storage` with the given configuration.
    pub fn with_config(storage: S, config: DatabaseConfig) -> Self {
        Self::from_shared(Arc::new(storage), config)
    }
}

impl<S: Storage + ?Sized> Database<S> {
    /// Creates a database over an already shared storage.
    pub fn from_shared(storage: Arc<S>, config: DatabaseConfig) -> Self {
        Self { storage, config, tables: HashMap::new() }
    }

    /// Returns the storage backing this database.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Returns the table `name`, opening it on first use.
    ///
    /// Opening a table does not write anything: a table shows up in
    /// [`tables`](Self::tables) once something has been written to it.
    pub fn table(&mut self, name: &str) -> &mut Table<S> {
        let storage = &self.storage;
        let config = &self.config.table;
        self.tables
            .entry(name.to_string())
            .or_insert_with(|| Table::with_config(storage.clone(), name, config.clone()))
    }

    /// Returns the default table.
    pub fn default_table(&mut self) -> &mut Table<S> {
        let name = self.config.default_table.clone();
        self.table(&name)
    }

    /// Returns the names of every table in the storage.
    pub fn tables(&self) -> DocumentStoreResult<BTreeSet<String>> {
        Ok(self
            .storage
            .read()?
            .map(|tables| tables.into_keys().collect())
            .unwrap_or_default())
    }

    /// Deletes the table `name` and its documents.
    ///
    /// Dropping a table that does not exist does nothing.
    pub fn drop_table(&mut self, name: &str) -> DocumentStoreResult<()> {
        if let Some(table) = self.tables.get_mut(name) {
            table.reset();
        }

        let Some(mut tables) = self.storage.read()? else {
            return Ok(());
        };
        if tables.remove(name).is_none() {
            return Ok(());
        }

        self.storage.write(tables)?;
        debug!(target: "doctable::database", table = name, "Dropped table");
        Ok(())
    }

    /// Deletes every table.
    pub fn drop_tables(&mut self) -> DocumentStoreResult<()> {
        self.storage.write(StoreMap::new())?;
        self.tables.clear();
        debug!(target: "doctable::database", "Dropped all tables");
        Ok(())
    }

    /// Closes the underlying storage.
    pub fn close(&mut self) -> DocumentStoreResult<()> {
        self.tables.clear();
        self.storage.close()
    }

    /// Inserts a document into the default table.
    pub fn insert(&mut self, document: impl Into<NewDocument>) -> DocumentStoreResult<DocId> {
        self.default_table().insert(document)
    }

    /// Inserts documents into the default table.
    pub fn insert_multiple<I>(&mut self, documents: I) -> DocumentStoreResult<Vec<DocId>>
    where
        I: IntoIterator,
        I::Item: Into<NewDocument>,
    {
        self.default_table().insert_multiple(documents)
    }

    /// Returns every document of the default table.
    pub fn all(&mut self) -> DocumentStoreResult<Vec<Document>> {
        self.default_table().all()
    }

    /// Searches the default table.
    pub fn search(&mut self, query: &QueryInstance) -> DocumentStoreResult<Vec<Document>> {
        self.default_table().search(query)
    }

    /// Returns the first matching document of the default table.
    pub fn get(&mut self, query: &QueryInstance) -> DocumentStoreResult<Option<Document>> {
        self.default_table().get(query)
    }

    /// Returns a document of the default table by ID.
    pub fn get_by_id(&mut self, doc_id: DocId) -> DocumentStoreResult<Option<Document>> {
        self.default_table().get_by_id(doc_id)
    }

    /// Returns `true` if a document of the default table matches.
    pub fn contains(&mut self, query: &QueryInstance) -> DocumentStoreResult<bool> {
        self.default_table().contains(query)
    }

    /// Updates matching documents of the default table.
    pub fn update(
        &mut self,
        update: impl Into<Update>,
        query: &QueryInstance,
    ) -> DocumentStoreResult<Vec<DocId>> {
        self.default_table().update(update, query)
    }

    /// Upserts into the default table.
    pub fn upsert(
        &mut self,
        document: impl Into<NewDocument>,
        query: Option<&QueryInstance>,
    ) -> DocumentStoreResult<Vec<DocId>> {
        self.default_table().upsert(document, query)
    }

    /// Removes matching documents from the default table.
    pub fn remove(&mut self, query: &QueryInstance) -> DocumentStoreResult<Vec<DocId>> {
        self.default_table().remove(query)
    }

    /// Removes every document from the default table.
    pub fn truncate(&mut self) -> DocumentStoreResult<()> {
        self.default_table().truncate()
    }

    /// Counts matching documents of the default table.
    pub fn count(&mut self, query: &QueryInstance) -> DocumentStoreResult<usize> {
        self.default_table().count(query)
    }

    /// Returns the number of documents in the default table.
    pub fn len(&mut self) -> DocumentStoreResult<usize> {
        self.default_table().len()
    }

    /// Returns `true` if the default table is empty.
    pub fn is_empty(&mut self) -> DocumentStoreResult<bool> {
        self.default_table().is_empty()
    }
}
