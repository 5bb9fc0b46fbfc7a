//! HTTP request handlers
//!
//! Each handler extracts its inputs, calls exactly one core operation and
//! serializes the result. Errors render through [`AppError`]'s `IntoResponse`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::error::AppError;
use crate::model::{
    Actor, AddToCollectionRequest, CollectionNameRequest, CursorParams, MovieInput, PageParams,
};
use crate::pager::Cursor;
use crate::state::AppState;

/// Lists the catalog one cursor page at a time
///
/// `GET /api/movies?cursor=<token>`
///
/// # Response
///
/// ```json
/// { "items": [...], "next_cursor": "eyJrZXkiOi..." }
/// ```
///
/// `next_cursor` is `null` on the last page.
pub async fn list_movies(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<CursorParams>,
) -> Result<impl IntoResponse, AppError> {
    let cursor = params
        .cursor
        .as_deref()
        .filter(|token| !token.is_empty())
        .map(Cursor::decode)
        .transpose()?;

    let page = state.pager().fetch_page(cursor.as_ref()).await?;
    Ok(Json(page))
}

/// Lists the catalog by page number
///
/// `GET /api/movies/browse?page=2`
///
/// # Response
///
/// ```json
/// { "items": [...], "page": 2, "total_pages": 5, "total_items": 43 }
/// ```
pub async fn browse_movies(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = state.pager().browse(params.page.unwrap_or(1)).await?;
    Ok(Json(page))
}

/// `GET /api/movies/{id}`
pub async fn get_movie(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let movie = state.catalog().get(&id).await?;
    Ok(Json(movie))
}

/// Creates a movie (admin only)
///
/// `POST /api/movies`
///
/// - **201 Created** - Movie created
/// - **400 Bad Request** - A field is missing or out of range
/// - **403 Forbidden** - Caller is not an admin
pub async fn create_movie(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<MovieInput>,
) -> Result<impl IntoResponse, AppError> {
    let movie = state.catalog().create(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

/// Replaces all editable fields of a movie (admin only)
///
/// `PUT /api/movies/{id}`
pub async fn update_movie(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(payload): Json<MovieInput>,
) -> Result<impl IntoResponse, AppError> {
    let movie = state.catalog().update(&actor, &id, payload).await?;
    Ok(Json(movie))
}

/// Deletes a movie after detaching it from every collection (admin only)
///
/// `DELETE /api/movies/{id}`
///
/// - **200 OK** - Movie gone and no collection references it
/// - **503 Service Unavailable** - Cascade incomplete; the movie was kept and
///   `remaining` lists the collections still referencing it. Safe to retry.
pub async fn delete_movie(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.catalog().delete(&actor, &id).await?;
    Ok(Json(json!({
        "message": "Movie deleted successfully",
        "deleted_id": id
    })))
}

/// Adds a movie to an existing collection or to a new one
///
/// `POST /api/movies/{id}/collections`
///
/// ```json
/// { "collectionId": "abc" }
/// { "newCollectionName": "Weekend" }
/// ```
pub async fn add_movie_to_collection(
    State(state): State<AppState>,
    actor: Actor,
    Path(movie_id): Path<String>,
    Json(payload): Json<AddToCollectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let membership = state.membership();

    let new_name = payload
        .new_collection_name
        .as_deref()
        .filter(|name| !name.is_empty());
    let existing_id = payload
        .collection_id
        .as_deref()
        .filter(|id| !id.is_empty());

    match (new_name, existing_id) {
        (Some(name), _) => {
            let collection = membership
                .add_to_new_collection(&actor.user_id, name, &movie_id)
                .await?;
            Ok((StatusCode::CREATED, Json(collection)).into_response())
        }
        (None, Some(collection_id)) => {
            membership
                .add_movie(&actor.user_id, collection_id, &movie_id)
                .await?;
            let collection = state.registry().get(&actor.user_id, collection_id).await?;
            Ok((StatusCode::OK, Json(collection)).into_response())
        }
        (None, None) => Err(AppError::InvalidRequest(
            "choose an existing collection or name a new one".to_string(),
        )),
    }
}

/// Lists the caller's collections with a cover image each
///
/// `GET /api/collections`
pub async fn list_collections(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse, AppError> {
    let summaries = state.registry().summaries(&actor.user_id).await?;
    Ok(Json(summaries))
}

/// Creates a collection
///
/// `POST /api/collections`
///
/// - **201 Created** - Collection created
/// - **400 Bad Request** - Empty name or disallowed characters
/// - **409 Conflict** - The caller already has a collection with that name
pub async fn create_collection(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CollectionNameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let collection = state
        .registry()
        .create(&actor.user_id, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

/// Returns a collection with its movies resolved
///
/// `GET /api/collections/{id}`
pub async fn get_collection(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let detail = state.membership().resolve(&actor.user_id, &id).await?;
    Ok(Json(detail))
}

/// `PATCH /api/collections/{id}`
pub async fn rename_collection(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(payload): Json<CollectionNameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let collection = state
        .registry()
        .rename(&actor.user_id, &id, &payload.name)
        .await?;
    Ok(Json(collection))
}

/// Deletes a collection; succeeds even if it is already gone
///
/// `DELETE /api/collections/{id}`
pub async fn delete_collection(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.registry().delete(&actor.user_id, &id).await?;
    Ok(Json(json!({
        "message": "Collection deleted successfully",
        "deleted_id": id
    })))
}

/// `PUT /api/collections/{id}/movies/{movie_id}`
pub async fn add_collection_movie(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, movie_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .membership()
        .add_movie(&actor.user_id, &id, &movie_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/collections/{id}/movies/{movie_id}`
pub async fn remove_collection_movie(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, movie_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .membership()
        .remove_movie(&actor.user_id, &id, &movie_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
