use crate::agent::ToolAgent;
use crate::backend::{BackendError, ConnectionTarget, McpBackend};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::handlers::platforms::handle_platforms;
use crate::handlers::search::{handle_last_search, handle_search};
use crate::handlers::watchlist::{handle_add, handle_list, handle_remove};
use crate::llm::LlmClient;
use crate::session::SessionRegistry;
use crate::watchlist::{MemoryStore, SupabaseStore, WatchlistStore};
use rocket::routes;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug)]
pub enum ServerError {
    Launch(rocket::Error),
    Backend(BackendError),
}

impl std::error::Error for ServerError {}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Launch(e) => write!(f, "Server launch error: {}", e),
            ServerError::Backend(e) => write!(f, "Backend setup error: {}", e),
        }
    }
}

pub struct ServerState {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: SessionRegistry,
    pub store: Arc<dyn WatchlistStore>,
}

impl ServerState {
    pub fn new(dispatcher: Arc<Dispatcher>, store: Arc<dyn WatchlistStore>) -> Self {
        Self {
            dispatcher,
            sessions: SessionRegistry::new(),
            store,
        }
    }

    /// Wires the backend client, model client, agent and store described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        let target = config.backend_target();
        // Fail at startup rather than on the first search.
        target.url().map_err(ServerError::Backend)?;
        let backend = McpBackend::new(Arc::new(target));

        let mut llm = LlmClient::new(config.openai_api_key.clone());
        if let Some(base_url) = &config.openai_base_url {
            llm = llm.with_base_url(base_url.clone());
        }

        let agent = ToolAgent::new(Arc::new(backend), Arc::new(llm), config.agent_settings());
        let dispatcher = Dispatcher::new(Arc::new(agent), config.catalog(), config.dispatch_config());

        let store: Arc<dyn WatchlistStore> = match config.supabase() {
            Some((url, key)) => {
                info!("using Supabase watchlist store");
                Arc::new(SupabaseStore::new(url, key.to_string()))
            }
            None => {
                info!("using in-memory watchlist store");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::new(Arc::new(dispatcher), store))
    }
}

pub fn create_server(state: ServerState) -> rocket::Rocket<rocket::Build> {
    rocket::build().manage(state).mount(
        "/",
        routes![
            handle_platforms,
            handle_search,
            handle_last_search,
            handle_add,
            handle_list,
            handle_remove
        ],
    )
}

pub async fn run_server(rocket: rocket::Rocket<rocket::Build>) -> Result<(), ServerError> {
    match rocket.launch().await {
        Ok(_) => Ok(()),
        Err(e) => {
            error!(error = %e, "failed to launch rocket server");
            Err(ServerError::Launch(e))
        }
    }
}
