pub mod agent;
pub mod aggregate;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod handlers;
pub mod llm;
pub mod platform;
pub mod prompts;
pub mod search;
pub mod server;
pub mod session;
pub mod utils;
pub mod watchlist;
