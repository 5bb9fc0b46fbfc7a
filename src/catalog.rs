//! Admin-side movie management
//!
//! Creating, replacing and deleting movies is restricted to admin actors.
//! Deleting runs the membership cascade first and only removes the movie
//! document once no collection references it any more.

use std::sync::Arc;

use chrono::Utc;

use crate::error::AppError;
use crate::membership::MembershipManager;
use crate::model::{Actor, Movie, MovieInput};
use crate::store::{to_fields, DocumentStore, EntityKind};

const MAX_RATING: f64 = 10.0;

/// Trims and checks an admin movie form.
///
/// Fields are checked in form order, so the first invalid field is the one
/// reported.
pub fn validate_movie(input: MovieInput) -> Result<MovieInput, AppError> {
    let required = |value: String, field: &str| -> Result<String, AppError> {
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(AppError::InvalidMovie(format!("`{}` is required", field)));
        }
        Ok(value)
    };

    let title = required(input.title, "title")?;
    let cover_url = required(input.cover_url, "coverUrl")?;
    let description = required(input.description, "description")?;
    let director = required(input.director, "director")?;

    if input.release_year <= 0 {
        return Err(AppError::InvalidMovie("releaseYear must be positive".to_string()));
    }
    if input.duration == 0 {
        return Err(AppError::InvalidMovie("duration must be positive".to_string()));
    }

    let genre: Vec<String> = input
        .genre
        .iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    if genre.is_empty() {
        return Err(AppError::InvalidMovie("at least one genre is required".to_string()));
    }
    if !(0.0..=MAX_RATING).contains(&input.rating) {
        return Err(AppError::InvalidMovie(format!(
            "rating must be between 0 and {}",
            MAX_RATING
        )));
    }

    Ok(MovieInput {
        title,
        cover_url,
        description,
        director,
        release_year: input.release_year,
        duration: input.duration,
        genre,
        rating: input.rating,
    })
}

fn require_admin(actor: &Actor) -> Result<(), AppError> {
    if !actor.is_admin {
        return Err(AppError::Forbidden("admin role required".to_string()));
    }
    Ok(())
}

pub struct MovieCatalog {
    store: Arc<dyn DocumentStore>,
    membership: MembershipManager,
}

impl MovieCatalog {
    pub fn new(store: Arc<dyn DocumentStore>, membership: MembershipManager) -> Self {
        Self { store, membership }
    }

    pub async fn get(&self, movie_id: &str) -> Result<Movie, AppError> {
        let doc = self
            .store
            .get(EntityKind::Movies, movie_id)
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::Movies, movie_id))?;
        Ok(doc.decode()?)
    }

    pub async fn create(&self, actor: &Actor, input: MovieInput) -> Result<Movie, AppError> {
        require_admin(actor)?;
        let input = validate_movie(input)?;

        let mut movie = Movie {
            id: String::new(),
            title: input.title,
            cover_url: input.cover_url,
            description: input.description,
            director: input.director,
            release_year: input.release_year,
            duration: input.duration,
            genre: input.genre,
            rating: input.rating,
            created_at: Utc::now(),
        };
        movie.id = self
            .store
            .insert(EntityKind::Movies, to_fields(&movie)?)
            .await?;

        tracing::info!(admin = %actor.user_id, id = %movie.id, title = %movie.title, "movie created");
        Ok(movie)
    }

    /// Replaces every editable field of a movie. `createdAt` is kept.
    pub async fn update(
        &self,
        actor: &Actor,
        movie_id: &str,
        input: MovieInput,
    ) -> Result<Movie, AppError> {
        require_admin(actor)?;
        let input = validate_movie(input)?;
        let existing = self.get(movie_id).await?;

        let movie = Movie {
            id: existing.id,
            title: input.title,
            cover_url: input.cover_url,
            description: input.description,
            director: input.director,
            release_year: input.release_year,
            duration: input.duration,
            genre: input.genre,
            rating: input.rating,
            created_at: existing.created_at,
        };

        let mut fields = to_fields(&movie)?;
        fields.remove("createdAt");
        self.store
            .update_fields(EntityKind::Movies, movie_id, fields)
            .await?;

        tracing::info!(admin = %actor.user_id, id = movie_id, "movie updated");
        Ok(movie)
    }

    /// Detaches the movie from every collection, then deletes it.
    ///
    /// If the cascade fails the movie is kept and the error lists the
    /// collections still referencing it; calling this again retries the whole
    /// operation. Deleting an unknown movie still sweeps stale references.
    ///
    /// The cascade and the delete run on their own task: once started they
    /// finish even if the caller stops waiting.
    pub async fn delete(&self, actor: &Actor, movie_id: &str) -> Result<(), AppError> {
        require_admin(actor)?;

        let store = self.store.clone();
        let membership = self.membership.clone();
        let id = movie_id.to_string();
        let admin = actor.user_id.clone();

        let task = tokio::spawn(async move {
            let report = membership.cascade_delete_movie(&id).await?;
            let existed = store.delete(EntityKind::Movies, &id).await?;

            tracing::info!(
                admin = %admin,
                id = %id,
                existed,
                detached = report.detached_from.len(),
                "movie deleted"
            );
            Ok::<(), AppError>(())
        });

        task.await.map_err(|err| {
            tracing::error!(movie_id, error = %err, "movie delete task failed");
            AppError::StoreUnavailable(format!("movie delete did not complete: {}", err))
        })?
    }
}
