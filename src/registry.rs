//! Collection lifecycle and naming policy
//!
//! Names are trimmed, must be non-empty, may only contain ASCII letters, digits
//! and whitespace, and must be unique among the owner's collections ignoring
//! case. Checks run in that order so a name that breaks several rules always
//! reports the same error.
//!
//! The duplicate check reads the owner's collections from the store on every
//! call. The store has no multi-document transactions, so two sessions creating
//! the same name at the same instant can still both succeed.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::error::AppError;
use crate::model::{Collection, CollectionSummary, Movie};
use crate::store::{to_fields, DocumentStore, EntityKind, Fields, Query};

const OWNER_FIELD: &str = "userId";

/// Trims `raw` and checks it against the emptiness and character-set rules.
pub fn normalize_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::EmptyName);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
    {
        return Err(AppError::InvalidCharacters);
    }
    Ok(name.to_string())
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[derive(Clone)]
pub struct CollectionRegistry {
    store: Arc<dyn DocumentStore>,
}

impl CollectionRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// All collections of `owner`, oldest first.
    pub async fn list(&self, owner: &str) -> Result<Vec<Collection>, AppError> {
        let query = Query::new().filter_eq(OWNER_FIELD, owner);
        let docs = self.store.query(EntityKind::Collections, &query).await?;

        let mut collections: Vec<Collection> = docs
            .iter()
            .filter_map(|doc| match doc.decode::<Collection>() {
                Ok(collection) => Some(collection),
                Err(err) => {
                    tracing::warn!(owner, id = %doc.id, error = %err, "skipping undecodable collection");
                    None
                }
            })
            .collect();
        collections.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(collections)
    }

    /// Fetches a collection, checking that `owner` owns it.
    pub async fn get(&self, owner: &str, collection_id: &str) -> Result<Collection, AppError> {
        let doc = self
            .store
            .get(EntityKind::Collections, collection_id)
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::Collections, collection_id))?;

        let collection: Collection = doc.decode()?;
        ensure_owner(&collection, owner)?;
        Ok(collection)
    }

    /// Creates an empty collection for `owner`.
    pub async fn create(&self, owner: &str, raw_name: &str) -> Result<Collection, AppError> {
        let name = normalize_name(raw_name)?;
        self.ensure_unique(owner, &name, None).await?;

        let mut collection = Collection {
            id: String::new(),
            name,
            user_id: owner.to_string(),
            created_at: Utc::now(),
            movies: Vec::new(),
        };
        collection.id = self
            .store
            .insert(EntityKind::Collections, to_fields(&collection)?)
            .await?;

        tracing::info!(owner, id = %collection.id, name = %collection.name, "collection created");
        Ok(collection)
    }

    /// Renames one of `owner`'s collections.
    ///
    /// Renaming a collection to its current name, in any letter case, succeeds.
    /// Callers holding a previously fetched copy must refresh it themselves.
    pub async fn rename(
        &self,
        owner: &str,
        collection_id: &str,
        raw_name: &str,
    ) -> Result<Collection, AppError> {
        let mut collection = self.get(owner, collection_id).await?;
        let name = normalize_name(raw_name)?;
        self.ensure_unique(owner, &name, Some(collection_id)).await?;

        let mut fields = Fields::new();
        fields.insert("name".to_string(), Value::String(name.clone()));
        self.store
            .update_fields(EntityKind::Collections, collection_id, fields)
            .await?;

        tracing::info!(owner, id = collection_id, from = %collection.name, to = %name, "collection renamed");
        collection.name = name;
        Ok(collection)
    }

    /// Deletes one of `owner`'s collections. Member movies are not touched.
    ///
    /// Deleting a collection that does not exist is a no-op.
    pub async fn delete(&self, owner: &str, collection_id: &str) -> Result<(), AppError> {
        match self.get(owner, collection_id).await {
            Ok(_) => {}
            Err(AppError::NotFound { .. }) => return Ok(()),
            Err(err) => return Err(err),
        }

        self.store
            .delete(EntityKind::Collections, collection_id)
            .await?;
        tracing::info!(owner, id = collection_id, "collection deleted");
        Ok(())
    }

    /// `owner`'s collections, each with the cover of its first resolvable movie.
    pub async fn summaries(&self, owner: &str) -> Result<Vec<CollectionSummary>, AppError> {
        let collections = self.list(owner).await?;
        let mut summaries = Vec::with_capacity(collections.len());

        for collection in collections {
            let mut cover_url = None;
            for movie_id in &collection.movies {
                let Some(doc) = self.store.get(EntityKind::Movies, movie_id).await? else {
                    continue;
                };
                if let Ok(movie) = doc.decode::<Movie>() {
                    cover_url = Some(movie.cover_url);
                    break;
                }
            }
            summaries.push(CollectionSummary {
                collection,
                cover_url,
            });
        }

        Ok(summaries)
    }

    async fn ensure_unique(
        &self,
        owner: &str,
        name: &str,
        exclude: Option<&str>,
    ) -> Result<(), AppError> {
        let existing = self.list(owner).await?;
        let taken = existing
            .iter()
            .filter(|collection| Some(collection.id.as_str()) != exclude)
            .any(|collection| same_name(&collection.name, name));

        if taken {
            return Err(AppError::DuplicateName(name.to_string()));
        }
        Ok(())
    }
}

fn ensure_owner(collection: &Collection, owner: &str) -> Result<(), AppError> {
    if collection.user_id != owner {
        return Err(AppError::Forbidden(format!(
            "collection `{}` belongs to another user",
            collection.id
        )));
    }
    Ok(())
}
