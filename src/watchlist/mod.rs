//! Per-user watchlists of saved products.
//!
//! `WatchlistStore` hides where entries live: `MemoryStore` keeps them in the
//! process, `SupabaseStore` talks to the `users` and `watchlist` tables of a
//! Supabase project.

mod memory;
mod supabase;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

use crate::platform::Platform;
use crate::search::Hit;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Invalid email address: {0:?}")]
    InvalidEmail(String),
    #[error("Request to store failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Store returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Store returned no rows for {0}")]
    MissingRow(&'static str),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub email: String,
}

/// A saved product. The entry remembers which platform it came from and which
/// query found it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WatchlistEntry {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub user_id: String,
    pub title: String,
    pub url: String,
    pub rating: Option<String>,
    pub image_url: Option<String>,
    pub platform: String,
    pub search_query: String,
    pub created_at: DateTime<Utc>,
}

/// Row written when saving a hit; the store assigns `id` and `created_at`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NewWatchlistEntry {
    pub user_id: String,
    pub title: String,
    pub url: String,
    pub rating: Option<String>,
    pub image_url: Option<String>,
    pub platform: String,
    pub search_query: String,
}

impl NewWatchlistEntry {
    pub fn new(user_id: &str, hit: &Hit, platform: &Platform, search_query: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: hit.title.clone(),
            url: hit.url.clone(),
            rating: hit.rating.clone(),
            image_url: hit.image_url.clone(),
            platform: platform.to_string(),
            search_query: search_query.to_string(),
        }
    }
}

#[async_trait]
pub trait WatchlistStore: Send + Sync {
    /// Returns the user with this email, creating it on first sight.
    async fn get_or_create_user(&self, email: &str) -> Result<UserRecord, PersistenceError>;

    /// Saves a hit. Returns `false` without writing when the user already
    /// watches a product with the same URL.
    async fn add_to_watchlist(
        &self,
        user_id: &str,
        hit: &Hit,
        platform: &Platform,
        search_query: &str,
    ) -> Result<bool, PersistenceError>;

    /// Entries of one user, newest first.
    async fn list_watchlist(&self, user_id: &str) -> Result<Vec<WatchlistEntry>, PersistenceError>;

    async fn remove_from_watchlist(&self, entry_id: &str) -> Result<bool, PersistenceError>;
}

/// Row ids may be uuids or integer keys depending on the table definition.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(id) => id,
        Id::Number(id) => id.to_string(),
    })
}

/// Trims and lowercases an email, rejecting anything without an `@`.
pub fn normalize_email(email: &str) -> Result<String, PersistenceError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            Ok(email.to_lowercase())
        }
        _ => Err(PersistenceError::InvalidEmail(email.to_string())),
    }
}
