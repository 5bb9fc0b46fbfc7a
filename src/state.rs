//! Shared application state
//!
//! Services are cheap views over the shared store handle, so handlers build the
//! one they need per request.

use std::sync::Arc;

use crate::catalog::MovieCatalog;
use crate::config::Config;
use crate::database::RedbStore;
use crate::membership::MembershipManager;
use crate::pager::CatalogPager;
use crate::registry::CollectionRegistry;
use crate::store::DocumentStore;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// Opens the embedded database named by `config.database_url`.
    pub fn open(config: Config) -> Result<Self, crate::store::StoreError> {
        let store = RedbStore::open(&config.database_url)?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn pager(&self) -> CatalogPager {
        CatalogPager::new(self.store.clone(), self.config.page_size)
    }

    pub fn registry(&self) -> CollectionRegistry {
        CollectionRegistry::new(self.store.clone())
    }

    pub fn membership(&self) -> MembershipManager {
        MembershipManager::new(self.store.clone(), self.config.cascade_concurrency)
    }

    pub fn catalog(&self) -> MovieCatalog {
        MovieCatalog::new(self.store.clone(), self.membership())
    }
}
