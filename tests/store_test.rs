//! Behaviour of the embedded document store

mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use cinelog::database::{init_db, RedbStore, TABLE_COLLECTIONS, TABLE_MOVIES};
use cinelog::store::{compare_values, DocumentStore, EntityKind, Fields, Position, Query, StoreError};
use common::temp_store;

fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_insert_then_get() {
    let (store, _temp_db) = temp_store();

    let id = store
        .insert(EntityKind::Movies, fields(json!({ "title": "Alpha" })))
        .await
        .unwrap();
    assert_eq!(id.len(), 20);

    let doc = store.get(EntityKind::Movies, &id).await.unwrap().unwrap();
    assert_eq!(doc.id, id);
    assert_eq!(doc.fields["title"], "Alpha");

    // Entity types live in separate tables
    assert!(store.get(EntityKind::Collections, &id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_fields_is_partial() {
    let (store, _temp_db) = temp_store();
    let id = store
        .insert(
            EntityKind::Collections,
            fields(json!({ "name": "Old", "userId": "u1", "movies": ["m1"] })),
        )
        .await
        .unwrap();

    store
        .update_fields(EntityKind::Collections, &id, fields(json!({ "name": "New" })))
        .await
        .unwrap();

    let doc = store.get(EntityKind::Collections, &id).await.unwrap().unwrap();
    assert_eq!(doc.fields["name"], "New");
    assert_eq!(doc.fields["userId"], "u1");
    assert_eq!(doc.fields["movies"], json!(["m1"]));
}

#[tokio::test]
async fn test_update_missing_document_is_not_found() {
    let (store, _temp_db) = temp_store();

    let err = store
        .update_fields(EntityKind::Movies, "missing", fields(json!({ "title": "X" })))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));

    let err = store
        .array_add(EntityKind::Collections, "missing", "movies", json!("m1"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_delete_reports_existence() {
    let (store, _temp_db) = temp_store();
    let id = store
        .insert(EntityKind::Movies, fields(json!({ "title": "Gone" })))
        .await
        .unwrap();

    assert!(store.delete(EntityKind::Movies, &id).await.unwrap());
    assert!(!store.delete(EntityKind::Movies, &id).await.unwrap());
    assert!(store.get(EntityKind::Movies, &id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_array_add_and_remove_are_set_like() {
    let (store, _temp_db) = temp_store();
    let id = store
        .insert(EntityKind::Collections, fields(json!({ "movies": [] })))
        .await
        .unwrap();

    for movie in ["m1", "m2", "m1"] {
        store
            .array_add(EntityKind::Collections, &id, "movies", json!(movie))
            .await
            .unwrap();
    }
    store
        .array_remove(EntityKind::Collections, &id, "movies", json!("absent"))
        .await
        .unwrap();

    let doc = store.get(EntityKind::Collections, &id).await.unwrap().unwrap();
    assert_eq!(doc.fields["movies"], json!(["m1", "m2"]));

    store
        .array_remove(EntityKind::Collections, &id, "movies", json!("m1"))
        .await
        .unwrap();
    let doc = store.get(EntityKind::Collections, &id).await.unwrap().unwrap();
    assert_eq!(doc.fields["movies"], json!(["m2"]));
}

#[tokio::test]
async fn test_array_ops_reject_non_array_field() {
    let (store, _temp_db) = temp_store();
    let id = store
        .insert(EntityKind::Collections, fields(json!({ "movies": "oops" })))
        .await
        .unwrap();

    let err = store
        .array_add(EntityKind::Collections, &id, "movies", json!("m1"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Malformed(_)));
}

#[tokio::test]
async fn test_concurrent_array_adds_do_not_lose_updates() {
    let (store, _temp_db) = temp_store();
    let store = Arc::new(store);
    let id = store
        .insert(EntityKind::Collections, fields(json!({ "movies": [] })))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..16 {
        let store = store.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            store
                .array_add(EntityKind::Collections, &id, "movies", json!(format!("m{}", n)))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let doc = store.get(EntityKind::Collections, &id).await.unwrap().unwrap();
    assert_eq!(doc.fields["movies"].as_array().unwrap().len(), 16);
}

#[tokio::test]
async fn test_query_filters_orders_and_resumes() {
    let (store, _temp_db) = temp_store();
    for (title, owner) in [("Gamma", "u1"), ("Alpha", "u1"), ("Beta", "u2"), ("Delta", "u1")] {
        store
            .insert(
                EntityKind::Movies,
                fields(json!({ "title": title, "owner": owner })),
            )
            .await
            .unwrap();
    }

    let query = Query::new().filter_eq("owner", "u1").order_by("title");
    let docs = store.query(EntityKind::Movies, &query).await.unwrap();
    let titles: Vec<&str> = docs.iter().map(|d| d.fields["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Alpha", "Delta", "Gamma"]);

    let after = Position::of(&docs[0], Some("title"));
    let rest = store
        .query(EntityKind::Movies, &query.clone().after(after).limit(1))
        .await
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].fields["title"], "Delta");
}

fn titles(docs: &[cinelog::store::Document]) -> Vec<&str> {
    docs.iter().map(|d| d.fields["title"].as_str().unwrap()).collect()
}

#[tokio::test]
async fn test_title_order_follows_updates_and_deletes() {
    let (store, _temp_db) = temp_store();
    let mut ids = Vec::new();
    for title in ["Delta", "Alpha", "Charlie", "Bravo"] {
        let id = store
            .insert(EntityKind::Movies, fields(json!({ "title": title })))
            .await
            .unwrap();
        ids.push(id);
    }
    let by_title = Query::new().order_by("title");

    // Retitling moves the document, other fields leave it where it is
    store
        .update_fields(EntityKind::Movies, &ids[0], fields(json!({ "title": "Aardvark" })))
        .await
        .unwrap();
    store
        .update_fields(EntityKind::Movies, &ids[2], fields(json!({ "rating": 9 })))
        .await
        .unwrap();
    store.delete(EntityKind::Movies, &ids[3]).await.unwrap();

    let docs = store.query(EntityKind::Movies, &by_title).await.unwrap();
    assert_eq!(titles(&docs), vec!["Aardvark", "Alpha", "Charlie"]);

    let after = Position::of(&docs[0], Some("title"));
    let page = store
        .query(EntityKind::Movies, &by_title.clone().after(after).limit(1))
        .await
        .unwrap();
    assert_eq!(titles(&page), vec!["Alpha"]);
}

#[tokio::test]
async fn test_equal_titles_and_prefix_titles_keep_order() {
    let (store, _temp_db) = temp_store();
    for title in ["Up", "Upgrade", "Up", "U"] {
        store
            .insert(EntityKind::Movies, fields(json!({ "title": title })))
            .await
            .unwrap();
    }

    let docs = store
        .query(EntityKind::Movies, &Query::new().order_by("title"))
        .await
        .unwrap();
    assert_eq!(titles(&docs), vec!["U", "Up", "Up", "Upgrade"]);
    assert!(docs[1].id < docs[2].id);

    // Resuming between the two equal titles yields only the second one
    let after = Position::of(&docs[1], Some("title"));
    let rest = store
        .query(EntityKind::Movies, &Query::new().order_by("title").after(after))
        .await
        .unwrap();
    assert_eq!(rest[0].id, docs[2].id);
    assert_eq!(rest.len(), 2);
}

#[tokio::test]
async fn test_owner_filter_does_not_match_longer_owner_ids() {
    let (store, _temp_db) = temp_store();
    for owner in ["ann", "anna", "ann", "an"] {
        store
            .insert(EntityKind::Collections, fields(json!({ "userId": owner, "movies": [] })))
            .await
            .unwrap();
    }

    let docs = store
        .query(EntityKind::Collections, &Query::new().filter_eq("userId", "ann"))
        .await
        .unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| d.fields["userId"] == "ann"));
}

#[tokio::test]
async fn test_indexes_rebuilt_on_open() {
    let (store, temp_db) = temp_store();
    drop(store);
    let path = temp_db.path().to_str().unwrap();

    // Rows written straight into the entity tables, as external tooling would
    {
        let db = init_db(path).unwrap();
        let write_txn = db.begin_write().unwrap();
        {
            let mut movies = write_txn.open_table(TABLE_MOVIES).unwrap();
            movies.insert("raw_movie", r#"{"title":"Imported"}"#).unwrap();
            let mut collections = write_txn.open_table(TABLE_COLLECTIONS).unwrap();
            collections
                .insert("raw_list", r#"{"userId":"owner","movies":[]}"#)
                .unwrap();
        }
        write_txn.commit().unwrap();
    }

    let store = RedbStore::open(path).unwrap();
    let docs = store
        .query(EntityKind::Movies, &Query::new().order_by("title"))
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "raw_movie");

    let docs = store
        .query(EntityKind::Collections, &Query::new().filter_eq("userId", "owner"))
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "raw_list");
}

#[tokio::test]
async fn test_query_array_contains() {
    let (store, _temp_db) = temp_store();
    let with = store
        .insert(EntityKind::Collections, fields(json!({ "movies": ["m1", "m2"] })))
        .await
        .unwrap();
    store
        .insert(EntityKind::Collections, fields(json!({ "movies": ["m2"] })))
        .await
        .unwrap();

    let docs = store
        .query(EntityKind::Collections, &Query::new().array_contains("movies", "m1"))
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, with);
}

#[test]
fn test_compare_values_orders_across_types() {
    use std::cmp::Ordering;

    assert_eq!(compare_values(&json!("Alpha"), &json!("Beta")), Ordering::Less);
    assert_eq!(compare_values(&json!(10), &json!(9.5)), Ordering::Greater);
    assert_eq!(compare_values(&Value::Null, &json!("a")), Ordering::Less);
    assert_eq!(compare_values(&json!(["a", "b"]), &json!(["a"])), Ordering::Greater);
}
