//! Tables: named collections of documents.
//!
//! A [`Table`] owns no documents. Every call reads the current state from its
//! [`Storage`], and every mutation runs exactly one cycle of reading the state, changing
//! the table in memory and writing the whole state back. The only things a table keeps
//! between calls are its query cache and the next document ID it will hand out.
//!
//! Documents are always returned in table order, which is ascending document ID.

use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, trace};

use crate::{
    cache::{CacheStats, LruCache},
    config::TableConfig,
    document::{into_fields, DocId, Document, Fields, NewDocument},
    error::{DocumentStoreError, DocumentStoreResult},
    operations::Update,
    query::{Query, QueryIdentity, QueryInstance},
    storage::{Storage, TableMap},
};

/// Documents of a table, decoded from storage.
type Rows = BTreeMap<DocId, Fields>;

/// Hands out document IDs.
///
/// The next ID is remembered between calls once known. When it is not (the table was
/// just opened, a document was inserted with an explicit ID, or the table was truncated)
/// it is recomputed from the IDs currently stored.
#[derive(Debug, Clone, Default)]
struct IdAllocator {
    next: Option<DocId>,
}

impl IdAllocator {
    fn allocate(&mut self, rows: &Rows, table: &str) -> DocumentStoreResult<DocId> {
        let id = match self.next {
            Some(id) => id,
            None => {
                let id = match rows.keys().next_back() {
                    Some(max) => max
                        .checked_add(1)
                        .ok_or_else(|| DocumentStoreError::IdExhausted(table.to_string()))?,
                    None => 1,
                };
                debug!(target: "doctable::table", table, next_id = id, "Recomputed next document id");
                id
            }
        };
        // Left unknown past the last ID, so the next call recomputes and fails
        self.next = id.checked_add(1);
        Ok(id)
    }

    fn forget(&mut self) {
        self.next = None;
    }
}

/// A named collection of documents backed by a shared [`Storage`].
///
/// # Examples
///
/// ```ignore
/// use doctable::{memory::MemoryStorage, query::field, table::Table};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let mut table = Table::new(Arc::new(MemoryStorage::new()), "users");
///
/// let ids = table.insert_multiple([json!({"name": "a"}), json!({"name": "b"})])?;
/// assert_eq!(ids, vec![1, 2]);
///
/// let found = table.search(&field("name").eq("b"))?;
/// assert_eq!(found[0].doc_id(), 2);
/// ```
#[derive(Debug)]
pub struct Table<S: Storage + ?Sized> {
    storage: Arc<S>,
    name: String,
    cache: LruCache<QueryIdentity, Vec<Document>>,
    ids: IdAllocator,
}

impl<S: Storage + ?Sized> Table<S> {
    /// Opens the table `name` in `storage` with the default configuration.
    ///
    /// Opening does not touch the storage; a table that was never written to simply
    /// reads as empty.
    pub fn new(storage: Arc<S>, name: impl Into<String>) -> Self {
        Self::with_config(storage, name, TableConfig::default())
    }

    /// Opens the table `name` in `storage` with the given configuration.
    pub fn with_config(storage: Arc<S>, name: impl Into<String>, config: TableConfig) -> Self {
        Self {
            storage,
            name: name.into(),
            cache: LruCache::new(config.cache_capacity),
            ids: IdAllocator::default(),
        }
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the storage backing this table.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Inserts a document and returns its ID.
    ///
    /// A plain JSON object receives the next free ID. A [`Document`] keeps its own ID.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::InvalidDocument`] if the document is not a JSON object
    /// - [`DocumentStoreError::DocumentAlreadyExists`] if an explicit ID is already taken
    pub fn insert(&mut self, document: impl Into<NewDocument>) -> DocumentStoreResult<DocId> {
        let document = document.into();
        let name = self.name.clone();
        self.update_table(move |rows, ids| insert_row(rows, ids, document, &name))
    }

    /// Inserts several documents in one write and returns their IDs in input order.
    ///
    /// Each document follows the rules of [`insert`](Self::insert). If any of them is
    /// rejected, none are written.
    pub fn insert_multiple<I>(&mut self, documents: I) -> DocumentStoreResult<Vec<DocId>>
    where
        I: IntoIterator,
        I::Item: Into<NewDocument>,
    {
        let documents = documents.into_iter().map(Into::into).collect::<Vec<NewDocument>>();
        let name = self.name.clone();
        self.update_table(move |rows, ids| {
            documents
                .into_iter()
                .map(|document| insert_row(rows, ids, document, &name))
                .collect()
        })
    }

    /// Returns every document.
    pub fn all(&self) -> DocumentStoreResult<Vec<Document>> {
        Ok(self.iter()?.collect())
    }

    /// Iterates over a snapshot of the table.
    pub fn iter(&self) -> DocumentStoreResult<impl Iterator<Item = Document>> {
        Ok(self
            .read_table()?
            .into_iter()
            .map(|(doc_id, fields)| Document::from_parts(doc_id, fields)))
    }

    /// Returns every document matching `query`.
    ///
    /// Results of cacheable queries are served from the query cache until the next
    /// write. The returned documents are a copy; changing them does not affect the
    /// cache.
    pub fn search(&mut self, query: &QueryInstance) -> DocumentStoreResult<Vec<Document>> {
        if let Some(identity) = query.identity() {
            if let Some(cached) = self.cache.get(identity) {
                trace!(target: "doctable::cache", table = %self.name, query = %identity, "Query cache hit");
                return Ok(cached.clone());
            }
            trace!(target: "doctable::cache", table = %self.name, query = %identity, "Query cache miss");
        }

        let found = self
            .iter()?
            .filter(|document| query.evaluate(document))
            .collect::<Vec<_>>();

        if let Some(identity) = query.identity() {
            self.cache.set(identity.clone(), found.clone());
        }

        Ok(found)
    }

    /// Returns the first document matching `query`, in table order.
    pub fn get(&self, query: &QueryInstance) -> DocumentStoreResult<Option<Document>> {
        Ok(self.iter()?.find(|document| query.evaluate(document)))
    }

    /// Returns the document with the given ID.
    pub fn get_by_id(&self, doc_id: DocId) -> DocumentStoreResult<Option<Document>> {
        Ok(self
            .read_table()?
            .remove(&doc_id)
            .map(|fields| Document::from_parts(doc_id, fields)))
    }

    /// Returns the documents with the given IDs, in table order. IDs that do not exist
    /// are skipped.
    pub fn get_by_ids(&self, doc_ids: &[DocId]) -> DocumentStoreResult<Vec<Document>> {
        Ok(self
            .iter()?
            .filter(|document| doc_ids.contains(&document.doc_id()))
            .collect())
    }

    /// Returns `true` if any document matches `query`.
    pub fn contains(&self, query: &QueryInstance) -> DocumentStoreResult<bool> {
        Ok(self.get(query)?.is_some())
    }

    /// Returns `true` if a document with the given ID exists.
    pub fn contains_id(&self, doc_id: DocId) -> DocumentStoreResult<bool> {
        Ok(self.read_table()?.contains_key(&doc_id))
    }

    /// Applies `update` to every document matching `query` and returns their IDs.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::InvalidDocument`] if a field update is not a JSON object
    /// - any error returned by a transform, in which case nothing is written
    pub fn update(
        &mut self,
        update: impl Into<Update>,
        query: &QueryInstance,
    ) -> DocumentStoreResult<Vec<DocId>> {
        let update = update.into();
        update.validate()?;
        self.update_table(|rows, _| {
            let mut updated = Vec::new();
            for (doc_id, fields) in rows.iter_mut() {
                if query.evaluate(fields) {
                    update.apply(fields)?;
                    updated.push(*doc_id);
                }
            }
            Ok(updated)
        })
    }

    /// Applies `update` to the documents with the given IDs and returns the IDs that
    /// exist. Missing IDs are skipped.
    pub fn update_by_ids(
        &mut self,
        update: impl Into<Update>,
        doc_ids: &[DocId],
    ) -> DocumentStoreResult<Vec<DocId>> {
        let update = update.into();
        update.validate()?;
        self.update_table(|rows, _| {
            let mut updated = Vec::new();
            for doc_id in doc_ids {
                if let Some(fields) = rows.get_mut(doc_id) {
                    update.apply(fields)?;
                    updated.push(*doc_id);
                }
            }
            Ok(updated)
        })
    }

    /// Applies `update` to every document and returns their IDs.
    pub fn update_all(&mut self, update: impl Into<Update>) -> DocumentStoreResult<Vec<DocId>> {
        self.update(update, &Query::noop())
    }

    /// Applies several updates in one write.
    ///
    /// Documents are visited in table order. For each document every pair is checked in
    /// turn, against the document as already changed by the earlier pairs, so a document
    /// can be updated more than once and its ID then appears more than once in the
    /// result.
    pub fn update_multiple<U, I>(&mut self, updates: I) -> DocumentStoreResult<Vec<DocId>>
    where
        U: Into<Update>,
        I: IntoIterator<Item = (U, QueryInstance)>,
    {
        let updates = updates
            .into_iter()
            .map(|(update, query)| {
                let update = update.into();
                update.validate().map(|_| (update, query))
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        self.update_table(|rows, _| {
            let mut updated = Vec::new();
            for (doc_id, fields) in rows.iter_mut() {
                for (update, query) in &updates {
                    if query.evaluate(fields) {
                        update.apply(fields)?;
                        updated.push(*doc_id);
                    }
                }
            }
            Ok(updated)
        })
    }

    /// Updates matching documents, or inserts `document` if none match.
    ///
    /// A [`Document`] is matched by its own ID and `query` is ignored. A plain JSON
    /// object is matched with `query`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::MissingSelector`] if `document` carries no ID and
    /// no query is given.
    pub fn upsert(
        &mut self,
        document: impl Into<NewDocument>,
        query: Option<&QueryInstance>,
    ) -> DocumentStoreResult<Vec<DocId>> {
        let document = document.into();
        let updated = match (&document, query) {
            (NewDocument::Tagged(tagged), _) => {
                self.update_by_ids(Update::Fields(tagged.fields().clone().into()), &[tagged.doc_id()])?
            }
            (NewDocument::Untagged(fields), Some(query)) => self.update(fields.clone(), query)?,
            (NewDocument::Untagged(_), None) => {
                return Err(DocumentStoreError::MissingSelector(
                    "upsert needs a document with an id or a query",
                ));
            }
        };

        if !updated.is_empty() {
            return Ok(updated);
        }
        Ok(vec![self.insert(document)?])
    }

    /// Removes every document matching `query` and returns their IDs.
    ///
    /// Use [`truncate`](Self::truncate) to remove everything.
    pub fn remove(&mut self, query: &QueryInstance) -> DocumentStoreResult<Vec<DocId>> {
        self.update_table(|rows, _| {
            let removed = rows
                .iter()
                .filter(|(_, fields)| query.evaluate(fields))
                .map(|(doc_id, _)| *doc_id)
                .collect::<Vec<_>>();
            for doc_id in &removed {
                rows.remove(doc_id);
            }
            Ok(removed)
        })
    }

    /// Removes the documents with the given IDs and returns the IDs that existed.
    pub fn remove_by_ids(&mut self, doc_ids: &[DocId]) -> DocumentStoreResult<Vec<DocId>> {
        self.update_table(|rows, _| {
            Ok(doc_ids
                .iter()
                .filter(|doc_id| rows.remove(*doc_id).is_some())
                .copied()
                .collect())
        })
    }

    /// Removes every document. The next inserted document gets ID `1` again.
    pub fn truncate(&mut self) -> DocumentStoreResult<()> {
        self.update_table(|rows, ids| {
            rows.clear();
            ids.forget();
            Ok(())
        })?;
        debug!(target: "doctable::table", table = %self.name, "Truncated table");
        Ok(())
    }

    /// Returns the number of documents matching `query`.
    pub fn count(&mut self, query: &QueryInstance) -> DocumentStoreResult<usize> {
        Ok(self.search(query)?.len())
    }

    /// Returns the number of documents in the table.
    pub fn len(&self) -> DocumentStoreResult<usize> {
        Ok(self.read_table()?.len())
    }

    /// Returns `true` if the table holds no documents.
    pub fn is_empty(&self) -> DocumentStoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drops every cached query result.
    pub fn clear_cache(&mut self) {
        if !self.cache.is_empty() {
            trace!(target: "doctable::cache", table = %self.name, len = self.cache.len(), "Cleared query cache");
        }
        self.cache.clear();
    }

    /// Returns the number of cached query results.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Returns the query cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Forgets the remembered next ID, so it is recomputed from storage.
    pub(crate) fn reset(&mut self) {
        self.ids.forget();
        self.clear_cache();
    }

    fn read_table(&self) -> DocumentStoreResult<Rows> {
        let mut tables = self.storage.read()?.unwrap_or_default();
        match tables.remove(&self.name) {
            Some(table) => decode(table, &self.name),
            None => Ok(Rows::new()),
        }
    }

    /// Runs one read, change, write cycle on this table.
    ///
    /// Nothing is written if `updater` fails. The query cache is cleared whenever a
    /// write was attempted.
    fn update_table<R, F>(&mut self, updater: F) -> DocumentStoreResult<R>
    where
        F: FnOnce(&mut Rows, &mut IdAllocator) -> DocumentStoreResult<R>,
    {
        let mut tables = self.storage.read()?.unwrap_or_default();
        let mut rows = match tables.remove(&self.name) {
            Some(table) => decode(table, &self.name)?,
            None => Rows::new(),
        };

        let saved_ids = self.ids.clone();
        let result = match updater(&mut rows, &mut self.ids) {
            Ok(result) => result,
            Err(err) => {
                self.ids = saved_ids;
                return Err(err);
            }
        };

        let written = rows.len();
        tables.insert(self.name.clone(), encode(rows));
        let outcome = self.storage.write(tables);
        self.clear_cache();

        if let Err(err) = outcome {
            self.ids = saved_ids;
            return Err(err);
        }

        debug!(target: "doctable::table", table = %self.name, documents = written, "Wrote table");
        Ok(result)
    }
}

fn insert_row(
    rows: &mut Rows,
    ids: &mut IdAllocator,
    document: NewDocument,
    table: &str,
) -> DocumentStoreResult<DocId> {
    let (doc_id, fields) = match document {
        NewDocument::Untagged(value) => {
            let fields = into_fields(value)?;
            (ids.allocate(rows, table)?, fields)
        }
        NewDocument::Tagged(document) => {
            let doc_id = document.doc_id();
            if rows.contains_key(&doc_id) {
                return Err(DocumentStoreError::DocumentAlreadyExists(doc_id, table.to_string()));
            }
            ids.forget();
            (doc_id, document.into_fields())
        }
    };

    rows.insert(doc_id, fields);
    Ok(doc_id)
}

fn decode(table: TableMap, name: &str) -> DocumentStoreResult<Rows> {
    table
        .into_iter()
        .map(|(key, body)| {
            let doc_id = key
                .parse::<DocId>()
                .ok()
                .filter(|doc_id| *doc_id != 0)
                .ok_or_else(|| DocumentStoreError::InvalidDocumentId(key.clone(), name.to_string()))?;
            Ok((doc_id, into_fields(body)?))
        })
        .collect()
}

fn encode(rows: Rows) -> TableMap {
    rows.into_iter()
        .map(|(doc_id, fields)| (doc_id.to_string(), fields.into()))
        .collect()
}
