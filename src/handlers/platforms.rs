use crate::platform::Platform;
use crate::server::ServerState;
use rocket::get;
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlatformsResponse {
    pub platforms: Vec<Platform>,
}

#[get("/platforms")]
pub async fn handle_platforms(state: &State<ServerState>) -> Json<PlatformsResponse> {
    Json(PlatformsResponse {
        platforms: state.dispatcher.catalog().platforms().to_vec(),
    })
}
