//! Client side of the remote tool-hosting backend (search, per-platform web data
//! extractors, markdown scraping) that the agent drives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod mcp;
pub mod target;

pub use mcp::McpBackend;
pub use target::{BackendCredentials, ConnectionTarget, SmitheryTarget, StaticTarget};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Invalid connection target: {0}")]
    InvalidTarget(String),
    #[error("Backend transport failed: {0}")]
    Transport(String),
    #[error("Backend returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Backend returned JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Backend protocol error: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Whether opening a fresh session might succeed where this one failed.
    /// Deliberate rejections such as a bad API key come back the same way on
    /// every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Transport(_) => true,
            BackendError::Status { status, .. } => *status == 429 || *status >= 500,
            BackendError::InvalidTarget(_) | BackendError::Rpc { .. } | BackendError::Protocol(_) => {
                false
            }
        }
    }
}

/// A tool advertised by the backend, as handed to the model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolHandle {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Text a tool produced. `is_error` marks failures the tool itself reported;
/// transport failures surface as `BackendError` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

/// An open session with the backend. Sessions are never shared between platforms:
/// one is opened per agent run and closed when the run ends.
#[async_trait]
pub trait ToolSession: Send + Sync {
    fn tools(&self) -> &[ToolHandle];

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, BackendError>;

    async fn close(self: Box<Self>) -> Result<(), BackendError>;
}

#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ToolSession>, BackendError>;
}
