use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use doctable::{memory::MemoryStorage, prelude::*};
use serde_json::json;

/// Counts writes and forwards everything to the wrapped storage.
#[derive(Debug)]
struct CountingWrites {
    inner: Arc<dyn Storage>,
    writes: AtomicUsize,
}

impl Storage for CountingWrites {
    fn read(&self) -> DocumentStoreResult<Option<StoreMap>> {
        self.inner.read()
    }

    fn write(&self, data: StoreMap) -> DocumentStoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(data)
    }

    fn close(&self) -> DocumentStoreResult<()> {
        self.inner.close()
    }
}

/// A storage that can no longer be written to.
#[derive(Debug, Default)]
struct ReadOnly;

impl Storage for ReadOnly {
    fn read(&self) -> DocumentStoreResult<Option<StoreMap>> {
        Ok(None)
    }

    fn write(&self, _data: StoreMap) -> DocumentStoreResult<()> {
        Err(DocumentStoreError::Storage("storage is read-only".to_string()))
    }
}

#[test]
fn test_wrapping_storage_delegates() {
    let memory = MemoryStorage::new();
    let wrapper = CountingWrites { inner: Arc::new(memory.clone()), writes: AtomicUsize::new(0) };
    let mut db = Database::new(wrapper);

    db.insert_multiple([json!({"n": 1}), json!({"n": 2})]).unwrap();
    db.remove(&field("n").eq(1)).unwrap();

    assert_eq!(db.storage().writes.load(Ordering::SeqCst), 2);
    assert_eq!(memory.to_json().unwrap(), json!({"_default": {"2": {"n": 2}}}));
    db.close().unwrap();
}

#[test]
fn test_runtime_selected_storage() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let mut db = Database::from_shared(storage.clone(), DatabaseConfig::default());

    db.table("t").insert(json!({"a": 1})).unwrap();

    assert!(storage.read().unwrap().unwrap().contains_key("t"));
}

#[test]
fn test_storage_errors_propagate() {
    let mut db = Database::new(ReadOnly);

    let err = db.insert(json!({})).unwrap_err();
    assert!(matches!(err, DocumentStoreError::Storage(message) if message == "storage is read-only"));
    assert!(db.all().unwrap().is_empty());
}

#[test]
fn test_two_tables_over_one_storage_see_each_others_writes() {
    let storage = Arc::new(MemoryStorage::new());
    let mut writer = Table::new(storage.clone(), "shared");
    let mut reader = Table::new(storage, "shared");

    writer.insert(json!({"v": 1})).unwrap();
    assert_eq!(reader.search(&field("v").eq(1)).unwrap().len(), 1);

    // The reader's cache only refreshes on its own writes
    writer.insert(json!({"v": 1})).unwrap();
    assert_eq!(reader.search(&field("v").eq(1)).unwrap().len(), 1);
    reader.clear_cache();
    assert_eq!(reader.search(&field("v").eq(1)).unwrap().len(), 2);
}

#[test]
fn test_drop_tables_through_database() {
    let storage = MemoryStorage::new();
    let mut db = Database::new(storage.clone());
    db.table("a").insert(json!({})).unwrap();
    db.table("b").insert(json!({})).unwrap();

    db.drop_table("a").unwrap();
    assert_eq!(db.tables().unwrap().into_iter().collect::<Vec<_>>(), vec!["b".to_string()]);

    db.drop_tables().unwrap();
    assert!(db.tables().unwrap().is_empty());
    assert_eq!(storage.to_json().unwrap(), json!({}));
}
