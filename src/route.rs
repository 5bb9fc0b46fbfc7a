//! Route definitions for the catalog API
//!
//! This module configures all HTTP routes and maps them to their respective handlers.

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;

use crate::handler::{
    add_collection_movie, add_movie_to_collection, browse_movies, create_collection, create_movie,
    delete_collection, delete_movie, get_collection, get_movie, list_collections, list_movies,
    remove_collection_movie, rename_collection, update_movie,
};
use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// - `GET /api/movies` - Cursor-paginated catalog (`?cursor=`)
/// - `GET /api/movies/browse` - Page-number catalog (`?page=`)
/// - `POST /api/movies` - Create a movie (admin)
/// - `GET|PUT|DELETE /api/movies/{id}` - Read, replace (admin), delete with cascade (admin)
/// - `POST /api/movies/{id}/collections` - Add a movie to an existing or new collection
/// - `GET|POST /api/collections` - List or create the caller's collections
/// - `GET|PATCH|DELETE /api/collections/{id}` - Resolve, rename, delete a collection
/// - `PUT|DELETE /api/collections/{id}/movies/{movie_id}` - Add or remove a member movie
///
/// Every route sits behind [`auth_middleware`] and expects the caller identity
/// headers described in [`crate::middleware`].
///
/// # Example Usage
///
/// ```no_run
/// # use cinelog::config::Config;
/// # use cinelog::state::AppState;
/// # use cinelog::route::create_app;
/// let state = AppState::open(Config::default()).unwrap();
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/browse", get(browse_movies))
        .route(
            "/movies/{id}",
            get(get_movie).put(update_movie).delete(delete_movie),
        )
        .route("/movies/{id}/collections", post(add_movie_to_collection))
        .route("/collections", get(list_collections).post(create_collection))
        .route(
            "/collections/{id}",
            get(get_collection)
                .patch(rename_collection)
                .delete(delete_collection),
        )
        .route(
            "/collections/{id}/movies/{movie_id}",
            put(add_collection_movie).delete(remove_collection_movie),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().nest("/api", api_routes).with_state(state)
}
