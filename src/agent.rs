use crate::backend::{BackendError, ToolBackend, ToolSession};
use crate::llm::{
    ChatModel, CompletionBuilder, LLMError, Message, Model, StructuredOutput, ToolCall,
    ToolDefinition,
};
use crate::platform::Platform;
use crate::prompts::{build_product_search_prompt, Prompt};
use crate::search::{CombinedSearchResponse, PlatformResult};
use crate::utils::{parse_json_response, truncate_to_char_boundary};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_TURNS: usize = 12;
pub const DEFAULT_MAX_TOOL_OUTPUT_CHARS: usize = 40_000;
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(180);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("Backend connection failed: {0}")]
    Connection(#[from] BackendError),
    #[error("Model request failed: {0}")]
    Llm(#[from] LLMError),
    #[error("Answer did not match the expected schema: {0}")]
    SchemaValidation(String),
    #[error("No final answer after {0} turns")]
    MaxTurnsExceeded(usize),
    #[error("No products found")]
    Empty,
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl InvokeError {
    /// Failures worth one more attempt: the backend or model endpoint hiccuped.
    pub fn is_transient(&self) -> bool {
        match self {
            InvokeError::Connection(e) => e.is_transient(),
            InvokeError::Llm(e) => e.is_transient(),
            _ => false,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            InvokeError::Connection(_) => "connection_error",
            InvokeError::Llm(_) => "llm_error",
            InvokeError::SchemaValidation(_) => "schema_validation_error",
            InvokeError::MaxTurnsExceeded(_) => "max_turns_exceeded",
            InvokeError::Empty => "empty_result",
            InvokeError::Timeout(_) => "timeout",
        }
    }
}

/// Runs the product-finding agent. One call is one complete agent run.
#[async_trait]
pub trait PlatformAgent: Send + Sync {
    async fn invoke(&self, query: &str, platform: &Platform)
        -> Result<PlatformResult, InvokeError>;

    /// Single run covering every platform at once.
    async fn invoke_combined(
        &self,
        query: &str,
        platforms: &[Platform],
    ) -> Result<CombinedSearchResponse, InvokeError>;
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: Model,
    pub max_turns: usize,
    pub max_tool_output_chars: usize,
    pub temperature: Option<f64>,
    /// Deadline for one run, session setup included. The session is still
    /// closed when it expires.
    pub run_timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: Model::GPT4oMini,
            max_turns: DEFAULT_MAX_TURNS,
            max_tool_output_chars: DEFAULT_MAX_TOOL_OUTPUT_CHARS,
            temperature: None,
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }
}

/// Tool-using agent: the model drives the backend's tools until it can answer in
/// the requested schema.
pub struct ToolAgent {
    backend: Arc<dyn ToolBackend>,
    llm: Arc<dyn ChatModel>,
    settings: AgentSettings,
}

impl ToolAgent {
    pub fn new(backend: Arc<dyn ToolBackend>, llm: Arc<dyn ChatModel>, settings: AgentSettings) -> Self {
        Self {
            backend,
            llm,
            settings,
        }
    }

    async fn run<T>(&self, prompt: Prompt) -> Result<T, InvokeError>
    where
        T: StructuredOutput + Serialize + Send,
    {
        let limit = self.settings.run_timeout;
        let started = Instant::now();
        let session = match timeout(limit, self.backend.open()).await {
            Ok(session) => session?,
            Err(_) => return Err(InvokeError::Timeout(limit)),
        };

        let remaining = limit.saturating_sub(started.elapsed());
        let running = self.run_in_session::<T>(session.as_ref(), prompt);
        let outcome = match timeout(remaining, running).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout = ?limit, "agent run timed out");
                Err(InvokeError::Timeout(limit))
            }
        };

        match timeout(CLOSE_TIMEOUT, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to close backend session"),
            Err(_) => warn!("timed out closing backend session"),
        }
        outcome
    }

    async fn run_in_session<T>(
        &self,
        session: &dyn ToolSession,
        prompt: Prompt,
    ) -> Result<T, InvokeError>
    where
        T: StructuredOutput + Serialize + Send,
    {
        let tools = session
            .tools()
            .iter()
            .map(|tool| {
                ToolDefinition::function(
                    tool.name.clone(),
                    tool.description.clone(),
                    tool.input_schema.clone(),
                )
            })
            .collect();
        let mut builder = CompletionBuilder::new()
            .model(self.settings.model.clone())
            .messages(prompt.build_messages())
            .tools(tools)
            .structured_output::<T>();
        if let Some(temperature) = self.settings.temperature {
            builder = builder.temperature(temperature);
        }
        let mut request = builder.build()?;

        for turn in 1..=self.settings.max_turns {
            let completion = self.llm.complete(&request).await?;
            if completion.wants_tools() {
                request.messages.push(Message::assistant_tool_calls(
                    completion.content.clone(),
                    completion.tool_calls.clone(),
                ));
                for call in &completion.tool_calls {
                    let output = self.execute_tool(session, call).await?;
                    request.messages.push(Message::tool(call.id.clone(), output));
                }
                continue;
            }

            let raw = completion.content.unwrap_or_default();
            debug!(turn, raw = %raw, "raw agent answer");
            let parsed: T = match parse_json_response(&raw) {
                Ok(parsed) => parsed,
                Err(e) => return Err(InvokeError::SchemaValidation(e.to_string())),
            };
            debug!(
                structured = %serde_json::to_string(&parsed).unwrap_or_default(),
                "structured agent answer"
            );
            return Ok(parsed);
        }
        Err(InvokeError::MaxTurnsExceeded(self.settings.max_turns))
    }

    /// Runs one requested tool call. Problems the model can react to (bad arguments,
    /// unknown tool, tool-reported errors) are returned to it as text; a broken
    /// backend connection ends the run.
    async fn execute_tool(
        &self,
        session: &dyn ToolSession,
        call: &ToolCall,
    ) -> Result<String, InvokeError> {
        let name = call.function.name.as_str();
        if !session.tools().iter().any(|tool| tool.name == name) {
            warn!(tool = name, "model requested an unknown tool");
            return Ok(format!("Error: unknown tool {}", name));
        }
        let arguments: serde_json::Value = if call.function.arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            match serde_json::from_str(&call.function.arguments) {
                Ok(arguments) => arguments,
                Err(e) => return Ok(format!("Error: arguments are not valid JSON: {}", e)),
            }
        };

        info!(tool = name, "calling backend tool");
        let output = match session.call_tool(name, arguments).await {
            Ok(output) => output,
            Err(BackendError::Rpc { code, message }) => {
                warn!(tool = name, code, error = %message, "tool call rejected");
                return Ok(format!("Error: {}", message));
            }
            Err(e) => return Err(InvokeError::Connection(e)),
        };
        let text = truncate_to_char_boundary(&output.text, self.settings.max_tool_output_chars);
        if output.is_error {
            warn!(tool = name, "tool reported an error");
            Ok(format!("Error: {}", text))
        } else {
            Ok(text.to_string())
        }
    }
}

#[async_trait]
impl PlatformAgent for ToolAgent {
    async fn invoke(
        &self,
        query: &str,
        platform: &Platform,
    ) -> Result<PlatformResult, InvokeError> {
        let prompt = build_product_search_prompt(query, std::slice::from_ref(platform));
        let answer: PlatformResult = self.run(prompt).await?;
        // The model may respell the platform; results are keyed by what was requested.
        Ok(PlatformResult::new(platform.clone(), answer.hits))
    }

    async fn invoke_combined(
        &self,
        query: &str,
        platforms: &[Platform],
    ) -> Result<CombinedSearchResponse, InvokeError> {
        let prompt = build_product_search_prompt(query, platforms);
        self.run(prompt).await
    }
}
