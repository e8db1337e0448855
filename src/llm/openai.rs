//! OpenAI LLM client implementation.
//!
//! Implements the LlmClient trait for OpenAI's chat completions API,
//! including function-calling support for the SQL agent.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GatewayError, Result};
use crate::llm::http;
use crate::llm::types::{LlmResponse, Message, ToolCall, ToolExchange};
use crate::llm::{LlmClient, ToolDefinition};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenAI API base URL.
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "gpt-4o").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// OpenAI LLM client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    /// Creates a new OpenAI client with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Converts internal messages to OpenAI API format.
    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
                tool_calls: None,
                tool_call_id: None,
            })
            .collect()
    }

    /// Appends a completed tool exchange to the wire message list:
    /// one assistant message carrying the tool calls, followed by one
    /// `tool` role message per result.
    fn append_exchange(wire: &mut Vec<OpenAiMessage>, exchange: &ToolExchange) {
        wire.push(OpenAiMessage {
            role: "assistant".to_string(),
            content: if exchange.assistant_content.is_empty() {
                None
            } else {
                Some(exchange.assistant_content.clone())
            },
            tool_calls: Some(
                exchange
                    .calls
                    .iter()
                    .map(|c| OpenAiToolCall {
                        id: c.id.clone(),
                        call_type: "function".to_string(),
                        function: OpenAiFunctionCall {
                            name: c.name.clone(),
                            arguments: c.arguments.clone(),
                        },
                    })
                    .collect(),
            ),
            tool_call_id: None,
        });

        for result in &exchange.results {
            wire.push(OpenAiMessage {
                role: "tool".to_string(),
                content: Some(result.content.clone()),
                tool_calls: None,
                tool_call_id: Some(result.tool_call_id.clone()),
            });
        }
    }

    /// Converts tool definitions to OpenAI's function wrapper.
    fn convert_tools(tools: &[ToolDefinition]) -> Vec<OpenAiTool> {
        tools
            .iter()
            .map(|t| OpenAiTool {
                tool_type: "function".to_string(),
                function: OpenAiFunctionDef {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Sends a request and returns the first choice message.
    async fn send_request(&self, request: &OpenAiRequest) -> Result<OpenAiResponseMessage> {
        let body = http::post_with_retry(
            "OpenAI",
            || {
                self.client
                    .post(OPENAI_API_URL)
                    .header("Authorization", format!("Bearer {}", self.config.api_key))
                    .header("Content-Type", "application/json")
                    .json(request)
            },
            Self::parse_error,
        )
        .await?;

        let response: OpenAiResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::llm(format!("Failed to parse response: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| GatewayError::llm("No response from OpenAI"))
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: reqwest::StatusCode, body: &str) -> (GatewayError, bool) {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return (
                GatewayError::llm("Authentication failed. Check your OPENAI_API_KEY."),
                false,
            );
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return (
                GatewayError::llm("Rate limited. Please wait and try again."),
                true,
            );
        }

        let is_retryable = status.is_server_error();

        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            return (
                GatewayError::llm(format!(
                    "OpenAI API error: {}",
                    error_response.error.message
                )),
                is_retryable,
            );
        }

        (
            GatewayError::llm(format!("OpenAI API error ({}): {}", status, body)),
            is_retryable,
        )
    }

    fn to_llm_response(message: OpenAiResponseMessage) -> LlmResponse {
        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall {
                id: c.id,
                name: c.function.name,
                arguments: c.function.arguments,
            })
            .collect::<Vec<_>>();

        LlmResponse {
            content: message.content.unwrap_or_default(),
            tool_calls,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(messages),
            tools: None,
        };

        let message = self.send_request(&request).await?;
        message
            .content
            .filter(|c| !c.is_empty())
            .ok_or_else(|| GatewayError::llm("No response from OpenAI"))
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(messages),
            tools: Some(Self::convert_tools(tools)),
        };

        let message = self.send_request(&request).await?;
        Ok(Self::to_llm_response(message))
    }

    async fn continue_with_tool_results(
        &self,
        messages: &[Message],
        exchanges: &[ToolExchange],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let mut wire = Self::convert_messages(messages);
        for exchange in exchanges {
            Self::append_exchange(&mut wire, exchange);
        }

        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: wire,
            tools: Some(Self::convert_tools(tools)),
        };

        let message = self.send_request(&request).await?;
        Ok(Self::to_llm_response(message))
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunctionDef,
}

#[derive(Debug, Serialize)]
struct OpenAiFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ToolResult;

    #[test]
    fn test_config_new() {
        let config = OpenAiConfig::new("sk-test", "gpt-4o");
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_config_with_timeout() {
        let config = OpenAiConfig::new("sk-test", "gpt-4o").with_timeout(120);
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_convert_messages() {
        let messages = vec![
            Message::system("You are a SQL assistant."),
            Message::user("List all the users"),
        ];

        let converted = OpenAiClient::convert_messages(&messages);

        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, "system");
        assert_eq!(converted[1].role, "user");
        assert_eq!(
            converted[1].content,
            Some("List all the users".to_string())
        );
    }

    #[test]
    fn test_append_exchange() {
        let mut wire = Vec::new();
        let exchange = ToolExchange {
            assistant_content: String::new(),
            calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "run_sql".to_string(),
                arguments: r#"{"query":"SELECT 1"}"#.to_string(),
            }],
            results: vec![ToolResult {
                tool_call_id: "call_1".to_string(),
                content: "1".to_string(),
            }],
        };

        OpenAiClient::append_exchange(&mut wire, &exchange);

        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].role, "assistant");
        assert!(wire[0].tool_calls.is_some());
        assert_eq!(wire[1].role, "tool");
        assert_eq!(wire[1].tool_call_id, Some("call_1".to_string()));
    }

    #[test]
    fn test_parse_error_unauthorized() {
        let (error, is_retryable) =
            OpenAiClient::parse_error(reqwest::StatusCode::UNAUTHORIZED, "");
        assert!(error.to_string().contains("Authentication failed"));
        assert!(!is_retryable);
    }

    #[test]
    fn test_parse_error_rate_limited() {
        let (error, is_retryable) =
            OpenAiClient::parse_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert!(error.to_string().contains("Rate limited"));
        assert!(is_retryable);
    }

    #[test]
    fn test_parse_error_with_message() {
        let body = r#"{"error":{"message":"Invalid API key"}}"#;
        let (error, _) = OpenAiClient::parse_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert!(error.to_string().contains("Invalid API key"));
    }

    #[test]
    fn test_response_message_with_tool_calls() {
        let body = r#"{
            "content": null,
            "tool_calls": [
                {"id": "call_1", "type": "function",
                 "function": {"name": "run_sql", "arguments": "{\"query\":\"SELECT 1\"}"}}
            ]
        }"#;
        let message: OpenAiResponseMessage = serde_json::from_str(body).unwrap();
        let response = OpenAiClient::to_llm_response(message);

        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls[0].name, "run_sql");
        assert!(response.content.is_empty());
    }
}
