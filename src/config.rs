//! Runtime configuration read from the environment
//!
//! `main` loads a `.env` file first (if present), so every value below can come
//! from either source.
//!
//! - `PORT` - Server port number (default: 8080)
//! - `DATABASE_URL` - Path to database file (default: "data.db")
//! - `PAGE_SIZE` - Catalog page size (default: 10)
//! - `CASCADE_CONCURRENCY` - Max concurrent collection rewrites when deleting a movie (default: 8)
//! - `AUTHORIZATION` - Optional shared secret expected in the `Authorization` header
//! - `RUST_LOG` - tracing filter (default: "cinelog=debug,tower_http=debug")

use std::env;
use std::str::FromStr;

use crate::membership::DEFAULT_CASCADE_CONCURRENCY;
use crate::pager::DEFAULT_PAGE_SIZE;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_URL: &str = "data.db";
pub const DEFAULT_LOG_FILTER: &str = "cinelog=debug,tower_http=debug";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub page_size: usize,
    pub cascade_concurrency: usize,
    /// When set and non-empty, API requests must carry this exact `Authorization` header
    pub authorization: Option<String>,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            cascade_concurrency: DEFAULT_CASCADE_CONCURRENCY,
            authorization: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            // Logging is not up yet while configuration is read
            eprintln!("ignoring unparsable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    /// Reads configuration from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Self {
            port: parsed_or("PORT", defaults.port),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            page_size: parsed_or("PAGE_SIZE", defaults.page_size).max(1),
            cascade_concurrency: parsed_or("CASCADE_CONCURRENCY", defaults.cascade_concurrency)
                .max(1),
            authorization: env::var("AUTHORIZATION")
                .ok()
                .filter(|secret| !secret.is_empty()),
            log_filter: env::var("RUST_LOG").unwrap_or(defaults.log_filter),
        }
    }
}
