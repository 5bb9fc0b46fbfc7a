//! Movie ↔ collection membership
//!
//! Membership lives on the collection side only (`Collection::movies`). Adds and
//! removes go through the store's atomic array primitives so two sessions
//! touching the same collection never lose each other's write.
//!
//! Deleting a movie must first detach it from every collection. That cascade
//! fans out one array-remove per affected collection, at most
//! `cascade_concurrency` at a time, and only reports success once all of them
//! have landed. It is safe to run again after a partial failure: removing an
//! id that is already gone changes nothing.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::AppError;
use crate::model::{Collection, CollectionDetail, Movie};
use crate::registry::CollectionRegistry;
use crate::store::{DocumentStore, EntityKind, Query, StoreError};

/// Upper bound on concurrent collection rewrites during a cascade
pub const DEFAULT_CASCADE_CONCURRENCY: usize = 8;

const MOVIES_FIELD: &str = "movies";

/// Outcome of a successful cascade
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Collections that referenced the movie and were rewritten
    pub detached_from: Vec<String>,
}

#[derive(Clone)]
pub struct MembershipManager {
    store: Arc<dyn DocumentStore>,
    registry: CollectionRegistry,
    concurrency: usize,
}

impl MembershipManager {
    pub fn new(store: Arc<dyn DocumentStore>, concurrency: usize) -> Self {
        Self {
            registry: CollectionRegistry::new(store.clone()),
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Adds `movie_id` to one of `owner`'s collections. Already present is a no-op.
    pub async fn add_movie(
        &self,
        owner: &str,
        collection_id: &str,
        movie_id: &str,
    ) -> Result<(), AppError> {
        self.registry.get(owner, collection_id).await?;
        if self.store.get(EntityKind::Movies, movie_id).await?.is_none() {
            return Err(AppError::not_found(EntityKind::Movies, movie_id));
        }

        self.store
            .array_add(
                EntityKind::Collections,
                collection_id,
                MOVIES_FIELD,
                Value::String(movie_id.to_string()),
            )
            .await?;

        tracing::debug!(owner, collection_id, movie_id, "movie added to collection");
        Ok(())
    }

    /// Removes `movie_id` from one of `owner`'s collections. Absent is a no-op.
    pub async fn remove_movie(
        &self,
        owner: &str,
        collection_id: &str,
        movie_id: &str,
    ) -> Result<(), AppError> {
        self.registry.get(owner, collection_id).await?;

        self.store
            .array_remove(
                EntityKind::Collections,
                collection_id,
                MOVIES_FIELD,
                Value::String(movie_id.to_string()),
            )
            .await?;

        tracing::debug!(owner, collection_id, movie_id, "movie removed from collection");
        Ok(())
    }

    /// Creates a collection named `raw_name` and puts `movie_id` in it.
    ///
    /// The movie is checked before the collection is created, so an unknown
    /// movie never leaves an empty collection behind.
    pub async fn add_to_new_collection(
        &self,
        owner: &str,
        raw_name: &str,
        movie_id: &str,
    ) -> Result<Collection, AppError> {
        if self.store.get(EntityKind::Movies, movie_id).await?.is_none() {
            return Err(AppError::not_found(EntityKind::Movies, movie_id));
        }

        let mut collection = self.registry.create(owner, raw_name).await?;
        self.add_movie(owner, &collection.id, movie_id).await?;
        collection.movies.push(movie_id.to_string());
        Ok(collection)
    }

    /// Loads one of `owner`'s collections with its movies resolved.
    ///
    /// Ids that no longer point at a movie are dropped from the result.
    pub async fn resolve(
        &self,
        owner: &str,
        collection_id: &str,
    ) -> Result<CollectionDetail, AppError> {
        let collection = self.registry.get(owner, collection_id).await?;

        let mut movies = Vec::with_capacity(collection.movies.len());
        for movie_id in &collection.movies {
            match self.store.get(EntityKind::Movies, movie_id).await? {
                Some(doc) => match doc.decode::<Movie>() {
                    Ok(movie) => movies.push(movie),
                    Err(err) => tracing::warn!(movie_id = %movie_id, error = %err, "dropping undecodable movie"),
                },
                None => tracing::debug!(collection_id, movie_id = %movie_id, "dropping dangling movie id"),
            }
        }

        Ok(CollectionDetail { collection, movies })
    }

    /// Detaches `movie_id` from every collection that references it.
    ///
    /// Must complete successfully before the movie document itself is deleted.
    /// On failure nothing is rolled back: some collections may already be
    /// clean, and the error lists the ones that are not.
    pub async fn cascade_delete_movie(&self, movie_id: &str) -> Result<CascadeReport, AppError> {
        let query = Query::new().array_contains(MOVIES_FIELD, movie_id);
        let affected: Vec<String> = self
            .store
            .query(EntityKind::Collections, &query)
            .await?
            .into_iter()
            .map(|doc| doc.id)
            .collect();

        if affected.is_empty() {
            return Ok(CascadeReport::default());
        }

        tracing::info!(movie_id, collections = affected.len(), concurrency = self.concurrency, "detaching movie from collections");

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut pending: BTreeSet<String> = affected.iter().cloned().collect();
        let mut tasks = JoinSet::new();

        for collection_id in affected.iter().cloned() {
            let store = self.store.clone();
            let permits = permits.clone();
            let value = Value::String(movie_id.to_string());

            tasks.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            collection_id,
                            Err(StoreError::Unavailable("cascade aborted".to_string())),
                        )
                    }
                };
                let result = store
                    .array_remove(EntityKind::Collections, &collection_id, MOVIES_FIELD, value)
                    .await;
                (collection_id, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                // A collection deleted mid-cascade no longer references anything
                Ok((collection_id, Ok(()) | Err(StoreError::NotFound { .. }))) => {
                    pending.remove(&collection_id);
                }
                Ok((collection_id, Err(err))) => {
                    tracing::warn!(movie_id, collection_id = %collection_id, error = %err, "collection rewrite failed");
                }
                Err(err) => {
                    tracing::error!(movie_id, error = %err, "collection rewrite task panicked");
                }
            }
        }

        if !pending.is_empty() {
            let remaining: Vec<String> = pending.into_iter().collect();
            tracing::warn!(movie_id, remaining = remaining.len(), "cascade incomplete");
            return Err(AppError::PartialCascadeFailure {
                movie_id: movie_id.to_string(),
                remaining,
            });
        }

        Ok(CascadeReport {
            detached_from: affected,
        })
    }
}
