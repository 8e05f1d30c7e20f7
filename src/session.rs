use crate::aggregate::AggregateSearchResult;
use crate::dispatch::{Dispatcher, SearchError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// The most recent successful search of one caller.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LastSearch {
    pub query: String,
    pub result: AggregateSearchResult,
}

/// One caller's search context. Searches take `running` for their whole
/// duration; the remembered result has its own lock so reads never wait on a
/// search in flight.
#[derive(Debug, Default)]
pub struct SearchSession {
    running: Mutex<()>,
    last: RwLock<Option<LastSearch>>,
}

impl SearchSession {
    pub async fn last(&self) -> Option<LastSearch> {
        self.last.read().await.clone()
    }

    /// Runs a search and, if it succeeds, replaces the remembered result. A
    /// failed search leaves the previous one in place.
    pub async fn search<S: AsRef<str>>(
        &self,
        dispatcher: &Dispatcher,
        query: &str,
        platforms: &[S],
    ) -> Result<LastSearch, SearchError> {
        let _running = self.running.lock().await;
        let result = dispatcher.search(query, platforms).await?;
        let last = LastSearch {
            query: query.trim().to_string(),
            result,
        };
        *self.last.write().await = Some(last.clone());
        Ok(last)
    }
}

/// Search sessions keyed by caller identity.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SearchSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session(&self, caller: &str) -> Arc<SearchSession> {
        let key = caller.trim().to_lowercase();
        if let Some(session) = self.sessions.read().await.get(&key) {
            return session.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key)
            .or_insert_with_key(|key| {
                debug!(caller = %key, "new search session");
                Arc::new(SearchSession::default())
            })
            .clone()
    }

    pub async fn last_search(&self, caller: &str) -> Option<LastSearch> {
        self.session(caller).await.last().await
    }
}
