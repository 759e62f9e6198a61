use doctable::{memory::MemoryStorage, prelude::*};
use proptest::prelude::*;
use serde_json::{json, Value};

fn database() -> Database<MemoryStorage> {
    Database::new(MemoryStorage::new())
}

#[test]
fn test_insert_remove_search_scenario() {
    let mut db = database();

    let ids = db
        .insert_multiple([json!({"name": "a"}), json!({"name": "b"}), json!({"name": "c"})])
        .unwrap();
    assert_eq!(ids, vec![1, 2, 3]);

    assert_eq!(db.remove(&field("name").eq("b")).unwrap(), vec![2]);
    assert_eq!(db.len().unwrap(), 2);

    let query = field("name").eq("a");
    let first = db.search(&query).unwrap();
    let second = db.search(&query).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0], json!({"name": "a"}));
    assert_eq!(first[0].doc_id(), 1);
    assert_eq!(db.default_table().cache_stats().hits, 1);
}

#[test]
fn test_upsert_scenario() {
    let mut db = database();
    let query = field("name").eq("x");

    assert_eq!(db.upsert(json!({"name": "x", "value": 1}), Some(&query)).unwrap(), vec![1]);
    assert_eq!(db.upsert(json!({"name": "x", "value": 2}), Some(&query)).unwrap(), vec![1]);
    assert_eq!(db.count(&query).unwrap(), 1);
    assert_eq!(db.get(&query).unwrap().unwrap(), json!({"name": "x", "value": 2}));
}

#[test]
fn test_id_allocation() {
    let mut db = database();
    let table = db.table("ids");

    assert_eq!(table.insert(json!({})).unwrap(), 1);
    assert_eq!(table.insert(json!({})).unwrap(), 2);

    table.truncate().unwrap();
    assert_eq!(table.insert(json!({})).unwrap(), 1);

    table.insert(Document::new(json!({}), 50).unwrap()).unwrap();
    assert!(table.insert(json!({})).unwrap() > 50);
}

#[test]
fn test_cache_coherence_after_writes() {
    let mut db = database();
    let table = db.table("coherent");
    table.insert_multiple([json!({"n": 1}), json!({"n": 2})]).unwrap();
    let query = field("n").ge(2);

    assert_eq!(table.search(&query).unwrap().len(), 1);

    table.insert(json!({"n": 3})).unwrap();
    assert_eq!(table.search(&query).unwrap().len(), 2);

    table.update(json!({"n": 0}), &field("n").eq(2)).unwrap();
    assert_eq!(table.search(&query).unwrap().len(), 1);

    table.remove(&field("n").eq(3)).unwrap();
    assert!(table.search(&query).unwrap().is_empty());

    table.insert(json!({"n": 9})).unwrap();
    table.truncate().unwrap();
    assert!(table.search(&query).unwrap().is_empty());
}

#[test]
fn test_commuted_query_shares_cache_entry() {
    let mut db = database();
    let table = db.table("commute");
    table.insert(json!({"a": 1, "b": 2})).unwrap();

    table.search(&(field("a").eq(1) & field("b").eq(2))).unwrap();
    table.search(&(field("b").eq(2) & field("a").eq(1))).unwrap();

    assert_eq!(table.cache_len(), 1);
    assert_eq!(table.cache_stats().hits, 1);
}

#[test]
fn test_cache_capacity_evicts_oldest_query() {
    let config = DatabaseConfig::default().with_cache_capacity(2);
    let mut db = Database::with_config(MemoryStorage::new(), config);
    let table = db.default_table();
    table.insert(json!({"n": 1})).unwrap();

    for n in 0..3 {
        table.search(&field("n").eq(n)).unwrap();
    }
    assert_eq!(table.cache_len(), 2);
    assert_eq!(table.cache_stats().evictions, 1);

    // The first query was evicted and misses again
    let misses = table.cache_stats().misses;
    table.search(&field("n").eq(0)).unwrap();
    assert_eq!(table.cache_stats().misses, misses + 1);
}

#[test]
fn test_update_operations() {
    let mut db = database();
    db.insert(json!({"name": "counter", "count": 1, "tags": ["a"], "old": true})).unwrap();
    let query = field("name").eq("counter");

    db.update(increment("count"), &query).unwrap();
    db.update(add("tags", json!(["b"])), &query).unwrap();
    db.update(delete("old"), &query).unwrap();
    db.update(set("label", "c"), &query).unwrap();
    db.update(subtract("count", 10), &query).unwrap();

    assert_eq!(
        db.get_by_id(1).unwrap().unwrap(),
        json!({"name": "counter", "count": -8, "tags": ["a", "b"], "label": "c"})
    );
}

#[test]
fn test_update_with_closure() {
    let mut db = database();
    db.insert_multiple([json!({"name": "alice"}), json!({"name": "bob"})]).unwrap();

    let updated = db
        .update(
            Update::with(|document| {
                if let Some(Value::String(name)) = document.get_mut("name") {
                    *name = name.to_uppercase();
                }
                Ok(())
            }),
            &Query::noop(),
        )
        .unwrap();

    assert_eq!(updated, vec![1, 2]);
    assert!(db.contains(&field("name").eq("BOB")).unwrap());
}

#[test]
fn test_documents_returned_in_id_order() {
    let mut db = database();
    let table = db.table("order");
    table.insert(Document::new(json!({"n": 3}), 3).unwrap()).unwrap();
    table.insert(Document::new(json!({"n": 1}), 1).unwrap()).unwrap();
    table.insert(json!({"n": 4})).unwrap();

    let ids = table.all().unwrap().iter().map(Document::doc_id).collect::<Vec<_>>();
    assert_eq!(ids, vec![1, 3, 4]);
}

#[test]
fn test_table_reopened_from_existing_state() {
    let storage = MemoryStorage::builder()
        .with_json(json!({"people": {"4": {"name": "d"}, "2": {"name": "b"}}}))
        .unwrap()
        .build()
        .unwrap();
    let mut db = Database::new(storage);
    let people = db.table("people");

    assert_eq!(people.len().unwrap(), 2);
    assert_eq!(people.get_by_id(4).unwrap().unwrap(), json!({"name": "d"}));
    assert_eq!(people.insert(json!({"name": "e"})).unwrap(), 5);
}

#[test]
fn test_stored_layout() {
    let storage = MemoryStorage::new();
    let mut db = Database::new(storage.clone());
    db.table("t").insert(json!({"name": "a"})).unwrap();
    db.insert(json!({"x": 1})).unwrap();

    assert_eq!(
        storage.to_json().unwrap(),
        json!({"_default": {"1": {"x": 1}}, "t": {"1": {"name": "a"}}})
    );
}

fn arb_document() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map(
        "[a-z]{1,6}",
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            ".{0,8}".prop_map(Value::from),
        ],
        0..6,
    )
    .prop_map(|fields| Value::Object(fields.into_iter().collect()))
}

proptest! {
    #[test]
    fn prop_get_returns_inserted_document(documents in proptest::collection::vec(arb_document(), 1..8)) {
        let mut db = database();
        for document in documents {
            let id = db.insert(document.clone()).unwrap();
            prop_assert_eq!(db.get_by_id(id).unwrap().unwrap(), document);
        }
    }
}
