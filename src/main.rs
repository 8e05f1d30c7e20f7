use clap::Parser;
use dealhunt::config::Config;
use dealhunt::server::{create_server, run_server, ServerState};
use tracing_subscriber::EnvFilter;

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dealhunt=info")),
        )
        .init();

    let config = Config::parse();
    config.log_redacted();

    let state = ServerState::from_config(&config)?;
    let figment = rocket::Config::figment().merge(("port", config.port));

    run_server(create_server(state).configure(figment)).await?;
    Ok(())
}
