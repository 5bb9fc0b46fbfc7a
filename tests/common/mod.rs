//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::NamedTempFile;

use cinelog::catalog::MovieCatalog;
use cinelog::config::Config;
use cinelog::database::{init_db, RedbStore};
use cinelog::membership::MembershipManager;
use cinelog::model::{Actor, Movie, MovieInput};
use cinelog::state::AppState;
use cinelog::store::{Document, DocumentStore, EntityKind, Fields, Query, StoreError};

/// Creates a store over a temporary database file. Keep the file alive for the
/// duration of the test.
pub fn temp_store() -> (RedbStore, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db = init_db(temp_db.path().to_str().unwrap()).expect("Failed to initialize test database");
    (RedbStore::new(db), temp_db)
}

pub fn shared_store() -> (Arc<dyn DocumentStore>, NamedTempFile) {
    let (store, temp_db) = temp_store();
    let store: Arc<dyn DocumentStore> = Arc::new(store);
    (store, temp_db)
}

pub fn test_state(config: Config) -> (AppState, NamedTempFile) {
    let (store, temp_db) = shared_store();
    (AppState::new(store, config), temp_db)
}

pub fn flaky_store() -> (Arc<FlakyStore>, Arc<dyn DocumentStore>, NamedTempFile) {
    let (inner, temp_db) = temp_store();
    let flaky = Arc::new(FlakyStore::new(inner));
    let store: Arc<dyn DocumentStore> = flaky.clone();
    (flaky, store, temp_db)
}

pub fn admin() -> Actor {
    Actor::admin("admin_1")
}

pub fn movie_input(title: &str) -> MovieInput {
    MovieInput {
        title: title.to_string(),
        cover_url: format!("https://img.example.com/{}.jpg", title.to_lowercase()),
        description: format!("{} description", title),
        director: "Jane Doe".to_string(),
        release_year: 2010,
        duration: 120,
        genre: vec!["Drama".to_string()],
        rating: 7.5,
    }
}

pub fn catalog(store: &Arc<dyn DocumentStore>) -> MovieCatalog {
    MovieCatalog::new(store.clone(), MembershipManager::new(store.clone(), 4))
}

pub async fn seed_movie(store: &Arc<dyn DocumentStore>, title: &str) -> Movie {
    catalog(store)
        .create(&admin(), movie_input(title))
        .await
        .expect("Failed to seed movie")
}

pub async fn collection_movies(store: &Arc<dyn DocumentStore>, collection_id: &str) -> Vec<String> {
    let doc = store
        .get(EntityKind::Collections, collection_id)
        .await
        .unwrap()
        .expect("collection exists");
    doc.fields["movies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_str().unwrap().to_string())
        .collect()
}

/// Helper function to parse response body as JSON
pub async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

/// Store wrapper that injects faults: failing writes to selected documents,
/// failing queries, and slow array writes
pub struct FlakyStore {
    inner: RedbStore,
    failing: Mutex<HashSet<String>>,
    failing_queries: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
}

impl FlakyStore {
    pub fn new(inner: RedbStore) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            failing_queries: AtomicBool::new(false),
            write_delay: Mutex::new(None),
        }
    }

    pub fn fail_writes_to(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_queries(&self) {
        self.failing_queries.store(true, Ordering::SeqCst);
    }

    pub fn delay_writes(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = Some(delay);
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
        self.failing_queries.store(false, Ordering::SeqCst);
        *self.write_delay.lock().unwrap() = None;
    }

    fn check(&self, id: &str) -> Result<(), StoreError> {
        if self.failing.lock().unwrap().contains(id) {
            return Err(StoreError::Unavailable(format!("injected fault for {}", id)));
        }
        Ok(())
    }

    async fn slow_down(&self) {
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(kind, id).await
    }

    async fn query(&self, kind: EntityKind, query: &Query) -> Result<Vec<Document>, StoreError> {
        if self.failing_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected query fault".to_string()));
        }
        self.inner.query(kind, query).await
    }

    async fn insert(&self, kind: EntityKind, fields: Fields) -> Result<String, StoreError> {
        self.inner.insert(kind, fields).await
    }

    async fn update_fields(
        &self,
        kind: EntityKind,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.check(id)?;
        self.inner.update_fields(kind, id, fields).await
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool, StoreError> {
        self.inner.delete(kind, id).await
    }

    async fn array_add(
        &self,
        kind: EntityKind,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        self.check(id)?;
        self.inner.array_add(kind, id, field, value).await
    }

    async fn array_remove(
        &self,
        kind: EntityKind,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        self.slow_down().await;
        self.check(id)?;
        self.inner.array_remove(kind, id, field, value).await
    }
}
