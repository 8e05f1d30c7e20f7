use super::{
    normalize_email, NewWatchlistEntry, PersistenceError, UserRecord, WatchlistEntry,
    WatchlistStore,
};
use crate::platform::Platform;
use crate::search::Hit;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tracing::{debug, warn};

const USERS_TABLE: &str = "users";
const WATCHLIST_TABLE: &str = "watchlist";

/// Watchlist stored in Supabase through its PostgREST interface.
pub struct SupabaseStore {
    http: Client,
    rest_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct NewUser<'a> {
    email: &'a str,
}

impl SupabaseStore {
    pub fn new(project_url: &str, api_key: String) -> Self {
        Self {
            http: Client::new(),
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            api_key,
        }
    }

    fn table(&self, method: reqwest::Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, PersistenceError> {
        let response = request.send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn check(response: Response) -> Result<Response, PersistenceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(body);
        Err(PersistenceError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl WatchlistStore for SupabaseStore {
    async fn get_or_create_user(&self, email: &str) -> Result<UserRecord, PersistenceError> {
        let email = normalize_email(email)?;
        let existing: Vec<UserRecord> = Self::rows(
            self.table(reqwest::Method::GET, USERS_TABLE)
                .query(&[("select", "*".to_string()), ("email", format!("eq.{}", email))]),
        )
        .await?;
        if let Some(user) = existing.into_iter().next() {
            return Ok(user);
        }

        debug!(email = %email, "creating user");
        let created: Vec<UserRecord> = Self::rows(
            self.table(reqwest::Method::POST, USERS_TABLE)
                .header("Prefer", "return=representation")
                .json(&[NewUser { email: &email }]),
        )
        .await?;
        created
            .into_iter()
            .next()
            .ok_or(PersistenceError::MissingRow(USERS_TABLE))
    }

    async fn add_to_watchlist(
        &self,
        user_id: &str,
        hit: &Hit,
        platform: &Platform,
        search_query: &str,
    ) -> Result<bool, PersistenceError> {
        let existing: Vec<IgnoredAny> = Self::rows(
            self.table(reqwest::Method::GET, WATCHLIST_TABLE).query(&[
                ("select", "id".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("url", format!("eq.{}", hit.url)),
            ]),
        )
        .await?;
        if !existing.is_empty() {
            warn!(user_id, url = %hit.url, "product already in watchlist");
            return Ok(false);
        }

        let entry = NewWatchlistEntry::new(user_id, hit, platform, search_query);
        let inserted: Vec<IgnoredAny> = Self::rows(
            self.table(reqwest::Method::POST, WATCHLIST_TABLE)
                .header("Prefer", "return=representation")
                .json(&[entry]),
        )
        .await?;
        if inserted.is_empty() {
            return Err(PersistenceError::MissingRow(WATCHLIST_TABLE));
        }
        Ok(true)
    }

    async fn list_watchlist(&self, user_id: &str) -> Result<Vec<WatchlistEntry>, PersistenceError> {
        Self::rows(self.table(reqwest::Method::GET, WATCHLIST_TABLE).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", user_id)),
            ("order", "created_at.desc".to_string()),
        ]))
        .await
    }

    async fn remove_from_watchlist(&self, entry_id: &str) -> Result<bool, PersistenceError> {
        let removed: Vec<IgnoredAny> = Self::rows(
            self.table(reqwest::Method::DELETE, WATCHLIST_TABLE)
                .header("Prefer", "return=representation")
                .query(&[("id", format!("eq.{}", entry_id))]),
        )
        .await?;
        Ok(!removed.is_empty())
    }
}
