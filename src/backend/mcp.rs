use crate::backend::{BackendError, ConnectionTarget, ToolBackend, ToolHandle, ToolOutput, ToolSession};
use async_trait::async_trait;
use rmcp::model::{CallToolRequestParam, CallToolResult, Tool};
use rmcp::service::RunningService;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceError, ServiceExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Joins the text parts of a tool result, falling back to its structured
/// content when there is no text.
fn tool_output(result: CallToolResult) -> ToolOutput {
    let mut text = result
        .content
        .iter()
        .filter_map(|content| content.as_text())
        .map(|part| part.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    if text.is_empty() {
        if let Some(structured) = result.structured_content {
            text = structured.to_string();
        }
    }
    ToolOutput {
        text,
        is_error: result.is_error.unwrap_or(false),
    }
}

/// Opens MCP sessions over the streamable HTTP transport.
#[derive(Clone)]
pub struct McpBackend {
    target: Arc<dyn ConnectionTarget>,
}

impl McpBackend {
    pub fn new(target: Arc<dyn ConnectionTarget>) -> Self {
        Self { target }
    }
}

#[async_trait]
impl ToolBackend for McpBackend {
    async fn open(&self) -> Result<Box<dyn ToolSession>, BackendError> {
        let url = self.target.url()?;
        let transport = StreamableHttpClientTransport::from_uri(url.to_string());
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| transport_error("initialize", &e))?;

        let tools = match service.list_all_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                let error = service_error("tools/list", e);
                if let Err(e) = service.cancel().await {
                    warn!(error = %e, "failed to stop half-open backend session");
                }
                return Err(error);
            }
        };
        let tools = tools
            .into_iter()
            .map(tool_handle)
            .collect::<Result<Vec<_>, _>>()?;
        info!(tools = tools.len(), "backend session opened");
        Ok(Box::new(McpSession { service, tools }))
    }
}

pub struct McpSession {
    service: RunningService<RoleClient, ()>,
    tools: Vec<ToolHandle>,
}

#[async_trait]
impl ToolSession for McpSession {
    fn tools(&self) -> &[ToolHandle] {
        &self.tools
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput, BackendError> {
        let params = call_params(name, arguments)?;
        let result = self
            .service
            .call_tool(params)
            .await
            .map_err(|e| service_error("tools/call", e))?;
        Ok(tool_output(result))
    }

    async fn close(self: Box<Self>) -> Result<(), BackendError> {
        match self.service.cancel().await {
            Ok(reason) => {
                debug!(?reason, "backend session closed");
                Ok(())
            }
            Err(e) => Err(BackendError::Transport(format!("session shutdown: {}", e))),
        }
    }
}

fn tool_handle(tool: Tool) -> Result<ToolHandle, BackendError> {
    serde_json::to_value(&tool)
        .and_then(serde_json::from_value)
        .map_err(|e| BackendError::Protocol(format!("bad tool definition: {}", e)))
}

fn call_params(name: &str, arguments: Value) -> Result<CallToolRequestParam, BackendError> {
    let arguments = match arguments {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            return Err(BackendError::Protocol(format!(
                "tool arguments must be an object, got {}",
                other
            )))
        }
    };
    Ok(CallToolRequestParam {
        name: name.to_string().into(),
        arguments,
    })
}

fn service_error(operation: &str, error: ServiceError) -> BackendError {
    match error {
        ServiceError::McpError(e) => BackendError::Rpc {
            code: i64::from(e.code.0),
            message: e.message.to_string(),
        },
        other => transport_error(operation, &other),
    }
}

/// HTTP rejections keep their status so 4xx answers are not retried.
fn transport_error(operation: &str, error: &(dyn std::error::Error + 'static)) -> BackendError {
    let message = format!("{}: {}", operation, error);
    match http_status(error) {
        Some(status) => BackendError::Status { status, message },
        None => BackendError::Transport(message),
    }
}

fn http_status(error: &(dyn std::error::Error + 'static)) -> Option<u16> {
    let mut current = Some(error);
    while let Some(e) = current {
        if let Some(status) = e.downcast_ref::<reqwest::Error>().and_then(reqwest::Error::status) {
            return Some(status.as_u16());
        }
        current = e.source();
    }
    None
}
