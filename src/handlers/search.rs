use crate::aggregate::AggregateSearchResult;
use crate::handlers::{api_error, persistence_error, search_error, ApiResult};
use crate::search::PlatformResult;
use crate::server::ServerState;
use crate::watchlist::normalize_email;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, State};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchInput {
    pub query: String,
    pub platforms: Vec<String>,
    /// When set, the result is remembered as this caller's last search.
    #[serde(default)]
    pub user_email: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<PlatformResult>,
    pub total_hits: usize,
}

impl SearchResponse {
    fn new(query: &str, result: AggregateSearchResult) -> Self {
        Self {
            query: query.to_string(),
            total_hits: result.total_hits(),
            results: result.platforms,
        }
    }
}

#[post("/search", data = "<search_input>")]
pub async fn handle_search(
    state: &State<ServerState>,
    search_input: Json<SearchInput>,
) -> ApiResult<SearchResponse> {
    let input = search_input.into_inner();
    let result = match input.user_email.as_deref() {
        Some(email) => {
            let caller = normalize_email(email).map_err(persistence_error)?;
            let session = state.sessions.session(&caller).await;
            session
                .search(&state.dispatcher, &input.query, input.platforms.as_slice())
                .await
                .map(|last| last.result)
        }
        None => {
            state
                .dispatcher
                .search(&input.query, input.platforms.as_slice())
                .await
        }
    }
    .map_err(search_error)?;
    Ok(Json(SearchResponse::new(input.query.trim(), result)))
}

#[get("/search/last?<user_email>")]
pub async fn handle_last_search(
    state: &State<ServerState>,
    user_email: &str,
) -> ApiResult<SearchResponse> {
    let caller = normalize_email(user_email).map_err(persistence_error)?;
    match state.sessions.last_search(&caller).await {
        Some(last) => Ok(Json(SearchResponse::new(&last.query, last.result))),
        None => Err(api_error(
            Status::NotFound,
            "No search has been run for this user yet.",
            "no_last_search",
        )),
    }
}
