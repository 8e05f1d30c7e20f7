use crate::handlers::{api_error, persistence_error, ApiResult};
use crate::server::ServerState;
use crate::watchlist::{normalize_email, WatchlistEntry};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{delete, get, post, State};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AddInput {
    pub user_email: String,
    /// URL of a hit from the caller's last search.
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AddResponse {
    pub added: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WatchlistResponse {
    pub entries: Vec<WatchlistEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RemoveResponse {
    pub removed: bool,
}

#[post("/watchlist", data = "<add_input>")]
pub async fn handle_add(state: &State<ServerState>, add_input: Json<AddInput>) -> ApiResult<AddResponse> {
    let caller = normalize_email(&add_input.user_email).map_err(persistence_error)?;
    let last = state.sessions.last_search(&caller).await.ok_or_else(|| {
        api_error(
            Status::NotFound,
            "No search has been run for this user yet.",
            "no_last_search",
        )
    })?;
    let url = add_input.url.trim();
    let (platform, hit) = last.result.find_hit(url).ok_or_else(|| {
        api_error(
            Status::NotFound,
            format!("{} is not part of the last search results.", url),
            "unknown_hit",
        )
    })?;

    let user = state
        .store
        .get_or_create_user(&caller)
        .await
        .map_err(persistence_error)?;
    let added = state
        .store
        .add_to_watchlist(&user.id, hit, platform, &last.query)
        .await
        .map_err(persistence_error)?;
    if added {
        info!(platform = %platform, hit = %hit, "added to watchlist");
    }
    Ok(Json(AddResponse { added }))
}

#[get("/watchlist?<user_email>")]
pub async fn handle_list(state: &State<ServerState>, user_email: &str) -> ApiResult<WatchlistResponse> {
    let user = state
        .store
        .get_or_create_user(user_email)
        .await
        .map_err(persistence_error)?;
    let entries = state
        .store
        .list_watchlist(&user.id)
        .await
        .map_err(persistence_error)?;
    Ok(Json(WatchlistResponse { entries }))
}

#[delete("/watchlist/<entry_id>")]
pub async fn handle_remove(state: &State<ServerState>, entry_id: &str) -> ApiResult<RemoveResponse> {
    let removed = state
        .store
        .remove_from_watchlist(entry_id)
        .await
        .map_err(persistence_error)?;
    Ok(Json(RemoveResponse { removed }))
}
