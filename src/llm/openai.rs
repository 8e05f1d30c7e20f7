use crate::llm::{ChatModel, ChatRequest, Completion, LLMError, ToolCall};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIErrorBody {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

/// Chat-completions client for OpenAI or any endpoint that speaks the same protocol.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap, LLMError> {
        let mut headers = HeaderMap::new();
        let auth_header = match HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            Ok(header) => header,
            Err(e) => return Err(LLMError::RequestBuildingError(e.to_string())),
        };
        headers.insert(AUTHORIZATION, auth_header);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, LLMError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, |t| t.len()),
            "chat completion request"
        );

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            let message = match serde_json::from_str::<OpenAIErrorBody>(&body) {
                Ok(parsed) => parsed.error.message,
                Err(_) => body,
            };
            return Err(LLMError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: OpenAIResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => return Err(LLMError::ParseError(e.to_string())),
        };
        let choice = match body.choices.into_iter().next() {
            Some(choice) => choice,
            None => return Err(LLMError::EmptyResponse),
        };
        if let Some(refusal) = choice.message.refusal {
            return Err(LLMError::ParseError(format!("model refused: {}", refusal)));
        }
        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        if tool_calls.is_empty() && choice.message.content.as_deref().map_or(true, str::is_empty) {
            return Err(LLMError::EmptyResponse);
        }
        Ok(Completion {
            content: choice.message.content,
            tool_calls,
            finish_reason: choice.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_targets_openai() {
        let client = LlmClient::new("sk-test");
        assert_eq!(client.base_url, OPENAI_API_URL);
    }

    #[test]
    fn test_custom_base_url_drops_trailing_slash() {
        let client = LlmClient::new("sk-test").with_base_url("http://localhost:8097/v1/");
        assert_eq!(client.base_url, "http://localhost:8097/v1");
    }

    #[test]
    fn test_response_with_tool_calls_parses() {
        let body: OpenAIResponse = serde_json::from_str(
            r#"{
                "choices": [{
                    "index": 0,
                    "finish_reason": "tool_calls",
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "search_engine", "arguments": "{\"query\":\"tv\"}"}
                        }]
                    }
                }]
            }"#,
        )
        .unwrap();
        let message = &body.choices[0].message;
        assert!(message.content.is_none());
        let calls = message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "search_engine");
        assert_eq!(calls[0].kind, "function");
    }
}
