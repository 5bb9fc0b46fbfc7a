//! Data models for the movie catalog
//!
//! This module defines the persisted entities (movies and collections) and the
//! request/response shapes used by the HTTP handlers. Persisted field names are
//! camelCase; that layout is the schema external tooling must respect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog movie
///
/// Created, replaced and deleted by administrators only. `created_at` is set
/// once at creation and never rewritten.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    /// Store-assigned identifier
    #[serde(default)]
    pub id: String,

    /// Display title, also the catalog sort key
    pub title: String,

    pub cover_url: String,

    pub description: String,

    pub director: String,

    pub release_year: i32,

    /// Running time in minutes
    pub duration: u32,

    /// Ordered genre tags
    #[serde(default)]
    pub genre: Vec<String>,

    /// Rating on a 0 to 10 scale
    pub rating: f64,

    pub created_at: DateTime<Utc>,
}

/// A user-owned, named, deduplicated list of movie ids
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Store-assigned identifier
    #[serde(default)]
    pub id: String,

    /// Unique per owner, case-insensitively
    pub name: String,

    /// Owning user; never changes after creation
    pub user_id: String,

    pub created_at: DateTime<Utc>,

    /// Member movie ids in insertion order, without duplicates
    #[serde(default)]
    pub movies: Vec<String>,
}

/// Full set of admin-editable movie fields
///
/// Used for both creation and full-field replacement.
///
/// # Example
/// ```json
/// {
///   "title": "Inception",
///   "coverUrl": "https://picsum.photos/800/450",
///   "description": "A thief who steals corporate secrets...",
///   "director": "Christopher Nolan",
///   "releaseYear": 2010,
///   "duration": 148,
///   "genre": ["Action", "Sci-Fi", "Thriller"],
///   "rating": 8.8
/// }
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieInput {
    pub title: String,
    pub cover_url: String,
    pub description: String,
    pub director: String,
    pub release_year: i32,
    pub duration: u32,
    pub genre: Vec<String>,
    pub rating: f64,
}

/// Caller identity as established by the upstream auth provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: false,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: true,
        }
    }
}

/// A collection with the cover of its first resolvable movie, for overview grids
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    #[serde(flatten)]
    pub collection: Collection,
    pub cover_url: Option<String>,
}

/// A collection together with its resolved member movies
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CollectionDetail {
    pub collection: Collection,
    /// Movies in membership order; ids that no longer resolve are omitted
    pub movies: Vec<Movie>,
}

/// Request payload for creating or renaming a collection
///
/// # Example
/// ```json
/// { "name": "Watch Later" }
/// ```
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CollectionNameRequest {
    pub name: String,
}

/// Request payload for adding a movie to an existing or a brand-new collection
///
/// When `new_collection_name` is non-empty it wins over `collection_id`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct AddToCollectionRequest {
    pub collection_id: Option<String>,
    pub new_collection_name: Option<String>,
}

/// Query parameters for the cursor-paginated catalog listing
///
/// # Example
/// Query string: `?cursor=eyJrZXkiOiJCZXRhIiwiaWQiOiJhYmMifQ`
#[derive(Deserialize, Debug, Default)]
pub struct CursorParams {
    /// Token returned as `next_cursor` by the previous page; absent for the first page
    pub cursor: Option<String>,
}

/// Query parameters for the page-number catalog listing
///
/// # Example
/// Query string: `?page=2`
#[derive(Deserialize, Debug, Default)]
pub struct PageParams {
    /// Page number, starting from 1 (default: 1)
    pub page: Option<usize>,
}
