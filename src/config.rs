use crate::agent::{AgentSettings, DEFAULT_MAX_TOOL_OUTPUT_CHARS, DEFAULT_MAX_TURNS};
use crate::backend::target::DEFAULT_SMITHERY_SERVER_URL;
use crate::backend::{BackendCredentials, SmitheryTarget};
use crate::dispatch::{DispatchConfig, DispatchMode};
use crate::llm::Model;
use crate::platform::{PlatformCatalog, DEFAULT_PLATFORMS};
use clap::Parser;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug, Clone)]
#[command(name = "dealhunt", about = "Searches shopping platforms for products through a tool-using agent")]
pub struct Config {
    /// Port the HTTP server listens on
    #[arg(long, env = "DEALHUNT_PORT", default_value_t = 8095)]
    pub port: u16,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    /// OpenAI-compatible endpoint to use instead of api.openai.com
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    #[arg(long, env = "DEALHUNT_MODEL", default_value = "gpt-4o-mini")]
    pub model: Model,

    /// Streamable-HTTP MCP endpoint of the extraction backend
    #[arg(long, env = "SMITHERY_SERVER_URL", default_value = DEFAULT_SMITHERY_SERVER_URL)]
    pub smithery_server_url: String,

    #[arg(long, env = "SMITHERY_API_KEY", hide_env_values = true)]
    pub smithery_api_key: String,

    #[arg(long, env = "API_TOKEN", hide_env_values = true)]
    pub api_token: String,

    #[arg(long, env = "BROWSER_AUTH", hide_env_values = true)]
    pub browser_auth: String,

    #[arg(long, env = "WEB_UNLOCKER_ZONE")]
    pub web_unlocker_zone: String,

    #[arg(long, env = "DEALHUNT_DISPATCH_MODE", value_enum, default_value_t = DispatchMode::PerPlatform)]
    pub dispatch_mode: DispatchMode,

    /// Pause between two platform runs, in seconds
    #[arg(
        long,
        env = "DEALHUNT_COOLDOWN_SECS",
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub cooldown_secs: u64,

    #[arg(long, env = "DEALHUNT_PLATFORM_TIMEOUT_SECS", default_value_t = 180)]
    pub platform_timeout_secs: u64,

    #[arg(long, env = "DEALHUNT_MAX_RETRIES", default_value_t = 1)]
    pub max_retries: u32,

    #[arg(long, env = "DEALHUNT_RETRY_DELAY_MS", default_value_t = 2000)]
    pub retry_delay_ms: u64,

    #[arg(long, env = "DEALHUNT_MAX_TURNS", default_value_t = DEFAULT_MAX_TURNS)]
    pub max_turns: usize,

    #[arg(long, env = "DEALHUNT_MAX_TOOL_OUTPUT_CHARS", default_value_t = DEFAULT_MAX_TOOL_OUTPUT_CHARS)]
    pub max_tool_output_chars: usize,

    /// Platforms offered to callers, comma separated
    #[arg(long, env = "DEALHUNT_PLATFORMS", value_delimiter = ',', default_values_t = DEFAULT_PLATFORMS.map(String::from))]
    pub platforms: Vec<String>,

    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,
}

impl Config {
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            mode: self.dispatch_mode,
            cooldown: Duration::from_secs(self.cooldown_secs.max(1)),
            platform_timeout: Duration::from_secs(self.platform_timeout_secs),
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            model: self.model.clone(),
            max_turns: self.max_turns,
            max_tool_output_chars: self.max_tool_output_chars,
            run_timeout: Duration::from_secs(self.platform_timeout_secs),
            ..AgentSettings::default()
        }
    }

    pub fn catalog(&self) -> PlatformCatalog {
        PlatformCatalog::new(&self.platforms)
    }

    pub fn backend_target(&self) -> SmitheryTarget {
        let credentials = BackendCredentials {
            api_token: self.api_token.clone(),
            browser_auth: self.browser_auth.clone(),
            web_unlocker_zone: self.web_unlocker_zone.clone(),
        };
        SmitheryTarget::new(credentials, self.smithery_api_key.clone())
            .with_server_url(self.smithery_server_url.clone())
    }

    /// Supabase project URL and key, when both are configured.
    pub fn supabase(&self) -> Option<(&str, &str)> {
        match (&self.supabase_url, &self.supabase_key) {
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
                Some((url.as_str(), key.as_str()))
            }
            _ => None,
        }
    }

    pub fn log_redacted(&self) {
        info!(
            port = self.port,
            model = %self.model,
            llm_endpoint = self.openai_base_url.as_deref().unwrap_or("openai"),
            backend = %self.smithery_server_url,
            dispatch_mode = ?self.dispatch_mode,
            cooldown_secs = self.cooldown_secs,
            platform_timeout_secs = self.platform_timeout_secs,
            max_retries = self.max_retries,
            max_turns = self.max_turns,
            platforms = %self.platforms.join(","),
            watchlist = if self.supabase().is_some() { "supabase" } else { "memory" },
            "configuration loaded"
        );
    }
}
