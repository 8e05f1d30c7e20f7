use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
pub mod openai;
pub mod schema;

pub use openai::LlmClient;
pub use schema::StructuredOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "tool")]
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// The assistant turn that requested `tool_calls`; it must precede their results.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn function(
        name: impl Into<String>,
        description: Option<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            kind: function_kind(),
            function: FunctionDefinition {
                name: name.into(),
                description,
                parameters,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub json_schema: JsonSchemaFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub strict: bool,
    pub schema: serde_json::Value,
}

impl ResponseFormat {
    pub fn for_type<T: StructuredOutput>() -> Self {
        Self {
            format_type: "json_schema".to_string(),
            json_schema: JsonSchemaFormat {
                name: T::output_name(),
                strict: true,
                schema: T::strict_schema(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// The assistant's reply: either tool calls to run or a final answer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
}

impl Completion {
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
impl Completion {
    pub fn answer(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: Some("stop".to_string()),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
            finish_reason: Some("tool_calls".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Model {
    GPT4o,
    GPT4oMini,
    GPT41,
    GPT41Mini,
    Other(String),
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::GPT4o => write!(f, "gpt-4o"),
            Model::GPT4oMini => write!(f, "gpt-4o-mini"),
            Model::GPT41 => write!(f, "gpt-4.1"),
            Model::GPT41Mini => write!(f, "gpt-4.1-mini"),
            Model::Other(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for Model {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "gpt-4o" => Model::GPT4o,
            "gpt-4o-mini" => Model::GPT4oMini,
            "gpt-4.1" => Model::GPT41,
            "gpt-4.1-mini" => Model::GPT41Mini,
            other => Model::Other(other.to_string()),
        })
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, LLMError>;
}

#[derive(Debug, Clone, Default)]
pub struct CompletionBuilder {
    model: Option<Model>,
    messages: Vec<Message>,
    tools: Vec<ToolDefinition>,
    response_format: Option<ResponseFormat>,
    temperature: Option<f64>,
}

impl CompletionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn structured_output<T: StructuredOutput>(mut self) -> Self {
        self.response_format = Some(ResponseFormat::for_type::<T>());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn build(self) -> Result<ChatRequest, LLMError> {
        let model = match self.model {
            Some(m) => m,
            None => return Err(LLMError::RequestBuildingError("model is required".to_string())),
        };
        if self.messages.is_empty() {
            return Err(LLMError::RequestBuildingError(
                "at least one message is required".to_string(),
            ));
        }
        let (tools, tool_choice) = if self.tools.is_empty() {
            (None, None)
        } else {
            (Some(self.tools), Some(serde_json::json!("auto")))
        };
        Ok(ChatRequest {
            model: model.to_string(),
            messages: self.messages,
            tools,
            tool_choice,
            response_format: self.response_format,
            temperature: self.temperature,
        })
    }
}

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("LLM request building failed: {0}")]
    RequestBuildingError(String),
    #[error("LLM request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("LLM endpoint returned status {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("LLM response is empty")]
    EmptyResponse,
}

impl LLMError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LLMError::RequestError(_) => true,
            LLMError::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_round_trips_through_str() {
        assert_eq!("gpt-4o-mini".parse::<Model>().unwrap(), Model::GPT4oMini);
        assert_eq!(Model::GPT41.to_string(), "gpt-4.1");
        let other: Model = "o4-mini".parse().unwrap();
        assert_eq!(other, Model::Other("o4-mini".to_string()));
        assert_eq!(other.to_string(), "o4-mini");
    }

    #[test]
    fn test_builder_requires_model() {
        let err = CompletionBuilder::new()
            .messages(vec![Message::user("hi")])
            .build()
            .unwrap_err();
        assert!(matches!(err, LLMError::RequestBuildingError(_)));
    }

    #[test]
    fn test_builder_omits_tools_when_none_given() {
        let request = CompletionBuilder::new()
            .model(Model::GPT4oMini)
            .messages(vec![Message::system("be brief"), Message::user("hi")])
            .temperature(0.0)
            .build()
            .unwrap();
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("response_format").is_none());
        assert_eq!(body.as_object().unwrap().len(), 3);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn test_builder_sets_auto_tool_choice() {
        let request = CompletionBuilder::new()
            .model(Model::GPT4o)
            .messages(vec![Message::user("find a tv")])
            .tools(vec![ToolDefinition::function(
                "search_engine",
                Some("Search the web".to_string()),
                serde_json::json!({"type": "object", "properties": {}}),
            )])
            .build()
            .unwrap();
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "search_engine");
    }

    #[test]
    fn test_tool_message_serialization() {
        let message = Message::tool("call_1", "result text");
        let body = serde_json::to_value(&message).unwrap();
        assert_eq!(body["role"], "tool");
        assert_eq!(body["tool_call_id"], "call_1");
        assert!(body.get("tool_calls").is_none());
    }

    #[test]
    fn test_transient_classification() {
        let throttled = LLMError::ApiError {
            status: 429,
            message: "slow down".to_string(),
        };
        let bad_request = LLMError::ApiError {
            status: 400,
            message: "bad schema".to_string(),
        };
        assert!(throttled.is_transient());
        assert!(!bad_request.is_transient());
        assert!(!LLMError::EmptyResponse.is_transient());
    }
}
