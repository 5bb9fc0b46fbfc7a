//! Catalog pagination
//!
//! Two modes are offered:
//!
//! - [`CatalogPager::fetch_page`]: cursor-based pages ordered by title, used by
//!   the admin listing. Each page resumes strictly after the last movie of the
//!   previous one.
//! - [`CatalogPager::fetch_all`] + [`paginate_local`]: the whole catalog is read
//!   once and sliced by page number in memory, used by the end-user dashboard.
//!
//! # Consistency
//!
//! Cursor pagination is weakly consistent. A traversal of a static catalog sees
//! every movie exactly once, in title order. When movies are inserted or deleted
//! while a traversal is in progress, items near a page boundary may be skipped
//! or seen twice: the cursor only remembers the `(title, id)` of the last item
//! returned, not a snapshot of the catalog.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Serialize;

use crate::error::AppError;
use crate::model::Movie;
use crate::store::{Document, DocumentStore, EntityKind, Position, Query};

/// Number of movies per page unless configured otherwise
pub const DEFAULT_PAGE_SIZE: usize = 10;

const TITLE_FIELD: &str = "title";

/// Opaque position token marking the last movie of a page
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor(Position);

impl Cursor {
    /// Encodes the cursor as a URL-safe token.
    pub fn encode(&self) -> String {
        // Position holds only a JSON value and a string, serialization cannot fail
        let json = serde_json::to_vec(&self.0).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Parses a token produced by [`Cursor::encode`].
    pub fn decode(token: &str) -> Result<Self, AppError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| AppError::InvalidCursor)?;
        let position: Position =
            serde_json::from_slice(&bytes).map_err(|_| AppError::InvalidCursor)?;
        Ok(Cursor(position))
    }

    pub fn position(&self) -> &Position {
        &self.0
    }
}

impl Serialize for Cursor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

/// One page of a cursor traversal
#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    pub items: Vec<Movie>,
    /// `None` once the catalog is exhausted
    pub next_cursor: Option<Cursor>,
}

/// One page of an in-memory, page-number traversal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalPage<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Slices `items` into the 1-based `page` of `page_size` entries.
///
/// Page numbers below 1 are treated as 1; pages past the end are empty.
pub fn paginate_local<T: Clone>(items: &[T], page: usize, page_size: usize) -> LocalPage<T> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let start = (page - 1).saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());

    LocalPage {
        items: items[start..end].to_vec(),
        page,
        total_pages: items.len().div_ceil(page_size),
        total_items: items.len(),
    }
}

fn decode_movies(docs: &[Document]) -> Vec<Movie> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<Movie>() {
            Ok(movie) => Some(movie),
            Err(err) => {
                tracing::warn!(id = %doc.id, error = %err, "skipping undecodable movie");
                None
            }
        })
        .collect()
}

pub struct CatalogPager {
    store: Arc<dyn DocumentStore>,
    page_size: usize,
}

impl CatalogPager {
    pub fn new(store: Arc<dyn DocumentStore>, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the page following `cursor`, or the first page when `cursor` is `None`.
    ///
    /// `next_cursor` is `None` when the page holds fewer than `page_size` movies.
    /// A catalog whose size is a multiple of the page size therefore ends with an
    /// empty page.
    pub async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<CatalogPage, AppError> {
        let mut query = Query::new().order_by(TITLE_FIELD).limit(self.page_size);
        if let Some(cursor) = cursor {
            query = query.after(cursor.position().clone());
        }

        let docs = self.store.query(EntityKind::Movies, &query).await?;
        let next_cursor = if docs.len() < self.page_size {
            None
        } else {
            docs.last()
                .map(|doc| Cursor(Position::of(doc, Some(TITLE_FIELD))))
        };

        Ok(CatalogPage {
            items: decode_movies(&docs),
            next_cursor,
        })
    }

    /// Reads the whole catalog in title order.
    pub async fn fetch_all(&self) -> Result<Vec<Movie>, AppError> {
        let query = Query::new().order_by(TITLE_FIELD);
        let docs = self.store.query(EntityKind::Movies, &query).await?;
        Ok(decode_movies(&docs))
    }

    /// Reads the whole catalog and returns the requested page of it.
    pub async fn browse(&self, page: usize) -> Result<LocalPage<Movie>, AppError> {
        let movies = self.fetch_all().await?;
        Ok(paginate_local(&movies, page, self.page_size))
    }
}
