use super::{
    normalize_email, NewWatchlistEntry, PersistenceError, UserRecord, WatchlistEntry,
    WatchlistStore,
};
use crate::platform::Platform;
use crate::search::Hit;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    entries: Vec<WatchlistEntry>,
}

/// Watchlist kept in process memory. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatchlistStore for MemoryStore {
    async fn get_or_create_user(&self, email: &str) -> Result<UserRecord, PersistenceError> {
        let email = normalize_email(email)?;
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .entry(email.clone())
            .or_insert_with(|| UserRecord {
                id: Uuid::new_v4().to_string(),
                email,
            });
        Ok(user.clone())
    }

    async fn add_to_watchlist(
        &self,
        user_id: &str,
        hit: &Hit,
        platform: &Platform,
        search_query: &str,
    ) -> Result<bool, PersistenceError> {
        let mut tables = self.tables.write().await;
        if tables
            .entries
            .iter()
            .any(|e| e.user_id == user_id && e.url == hit.url)
        {
            warn!(user_id, url = %hit.url, "product already in watchlist");
            return Ok(false);
        }
        let new = NewWatchlistEntry::new(user_id, hit, platform, search_query);
        tables.entries.push(WatchlistEntry {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            title: new.title,
            url: new.url,
            rating: new.rating,
            image_url: new.image_url,
            platform: new.platform,
            search_query: new.search_query,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn list_watchlist(&self, user_id: &str) -> Result<Vec<WatchlistEntry>, PersistenceError> {
        let tables = self.tables.read().await;
        // Entries are appended in creation order.
        Ok(tables
            .entries
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn remove_from_watchlist(&self, entry_id: &str) -> Result<bool, PersistenceError> {
        let mut tables = self.tables.write().await;
        let before = tables.entries.len();
        tables.entries.retain(|e| e.id != entry_id);
        Ok(tables.entries.len() != before)
    }
}
