//! Movie catalog service
//!
//! Administrators curate a shared movie catalog; users browse it and keep
//! personal collections of movies. The crate keeps the movie ↔ collection
//! relationship consistent, enforces collection naming rules, and paginates the
//! catalog, all on top of the [`store::DocumentStore`] contract.

pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod membership;
pub mod middleware;
pub mod model;
pub mod pager;
pub mod registry;
pub mod route;
pub mod state;
pub mod store;
