//! Anthropic (Claude) LLM client implementation.
//!
//! Implements the LlmClient trait for Anthropic's messages API. Tool calls
//! and their results travel as `tool_use` / `tool_result` content blocks.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GatewayError, Result};
use crate::llm::http;
use crate::llm::types::{LlmResponse, Message, Role, ToolCall, ToolExchange};
use crate::llm::{LlmClient, ToolDefinition};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Anthropic API base URL.
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Maximum tokens to generate.
const MAX_TOKENS: u32 = 4096;

/// Anthropic client configuration.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "claude-sonnet-4-20250514").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl AnthropicConfig {
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

/// Anthropic LLM client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicClient {
    /// Creates a new Anthropic client with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Splits messages into the system prompt and the user/assistant turns
    /// Anthropic expects.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system = None;
        let mut converted = Vec::new();

        for message in messages {
            match message.role {
                Role::System => system = Some(message.content.clone()),
                Role::User | Role::Assistant => converted.push(AnthropicMessage {
                    role: message.role.as_str().to_string(),
                    content: vec![ContentBlock::Text {
                        text: message.content.clone(),
                    }],
                }),
            }
        }

        (system, converted)
    }

    /// Appends a completed tool exchange as an assistant turn with
    /// `tool_use` blocks followed by a user turn with `tool_result` blocks.
    fn append_exchange(wire: &mut Vec<AnthropicMessage>, exchange: &ToolExchange) -> Result<()> {
        let mut assistant_blocks = Vec::new();
        if !exchange.assistant_content.is_empty() {
            assistant_blocks.push(ContentBlock::Text {
                text: exchange.assistant_content.clone(),
            });
        }
        for call in &exchange.calls {
            let input: serde_json::Value = serde_json::from_str(&call.arguments)
                .map_err(|e| GatewayError::llm(format!("Invalid tool arguments: {}", e)))?;
            assistant_blocks.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input,
            });
        }

        wire.push(AnthropicMessage {
            role: "assistant".to_string(),
            content: assistant_blocks,
        });

        let result_blocks = exchange
            .results
            .iter()
            .map(|r| ContentBlock::ToolResult {
                tool_use_id: r.tool_call_id.clone(),
                content: r.content.clone(),
            })
            .collect();

        wire.push(AnthropicMessage {
            role: "user".to_string(),
            content: result_blocks,
        });

        Ok(())
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    async fn send_request(&self, request: &AnthropicRequest) -> Result<AnthropicResponse> {
        let body = http::post_with_retry(
            "Anthropic",
            || {
                self.client
                    .post(ANTHROPIC_API_URL)
                    .header("x-api-key", &self.config.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .header("Content-Type", "application/json")
                    .json(request)
            },
            Self::parse_error,
        )
        .await?;

        serde_json::from_str(&body)
            .map_err(|e| GatewayError::llm(format!("Failed to parse response: {}", e)))
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: reqwest::StatusCode, body: &str) -> (GatewayError, bool) {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return (
                GatewayError::llm("Authentication failed. Check your ANTHROPIC_API_KEY."),
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

        if let Ok(error_response) = serde_json::from_str::<AnthropicErrorResponse>(body) {
            return (
                GatewayError::llm(format!(
                    "Anthropic API error: {}",
                    error_response.error.message
                )),
                is_retryable,
            );
        }

        (
            GatewayError::llm(format!("Anthropic API error ({}): {}", status, body)),
            is_retryable,
        )
    }

    /// Flattens response content blocks into text and tool calls.
    fn to_llm_response(response: AnthropicResponse) -> Result<LlmResponse> {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ContentBlock::Text { text } => content.push_str(&text),
                ContentBlock::ToolUse { id, name, input } => {
                    let arguments = serde_json::to_string(&input).map_err(|e| {
                        GatewayError::llm(format!("Failed to serialize tool input: {}", e))
                    })?;
                    tool_calls.push(ToolCall {
                        id,
                        name,
                        arguments,
                    });
                }
                ContentBlock::ToolResult { .. } => {}
            }
        }

        Ok(LlmResponse {
            content,
            tool_calls,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let (system, converted) = Self::convert_messages(messages);
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: MAX_TOKENS,
            system,
            messages: converted,
            tools: None,
        };

        let response = self.send_request(&request).await?;
        let llm_response = Self::to_llm_response(response)?;

        if llm_response.content.is_empty() {
            return Err(GatewayError::llm("No response from Anthropic"));
        }
        Ok(llm_response.content)
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let (system, converted) = Self::convert_messages(messages);
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: MAX_TOKENS,
            system,
            messages: converted,
            tools: Some(Self::convert_tools(tools)),
        };

        let response = self.send_request(&request).await?;
        Self::to_llm_response(response)
    }

    async fn continue_with_tool_results(
        &self,
        messages: &[Message],
        exchanges: &[ToolExchange],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let (system, mut wire) = Self::convert_messages(messages);
        for exchange in exchanges {
            Self::append_exchange(&mut wire, exchange)?;
        }

        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: MAX_TOKENS,
            system,
            messages: wire,
            tools: Some(Self::convert_tools(tools)),
        };

        let response = self.send_request(&request).await?;
        Self::to_llm_response(response)
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    message: String,
}
