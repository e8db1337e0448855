//! Message types for LLM communication.
//!
//! Defines the core types used for building requests to LLM providers,
//! including the tool-call exchange structures used by the SQL agent loop.

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message providing context and instructions.
    System,
    /// User message (human input).
    User,
    /// Assistant message (LLM response).
    Assistant,
}

impl Role {
    /// Returns the role as a string for API requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender.
    pub role: Role,
    /// The content of the message.
    pub content: String,
}

impl Message {
    /// Creates a new message with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call (used to match results).
    pub id: String,
    /// Name of the tool to call.
    pub name: String,
    /// JSON arguments for the tool.
    pub arguments: String,
}

/// Result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result is for.
    pub tool_call_id: String,
    /// The result content (typically JSON or rendered rows).
    pub content: String,
}

/// One completed round of tool calls and their results.
///
/// The agent accumulates these across its loop so each provider can replay
/// the full exchange history in its own wire format.
#[derive(Debug, Clone)]
pub struct ToolExchange {
    /// Text the assistant emitted alongside the tool calls (may be empty).
    pub assistant_content: String,
    /// Tool calls the assistant requested.
    pub calls: Vec<ToolCall>,
    /// Results for those calls, in the same order.
    pub results: Vec<ToolResult>,
}

/// Response from an LLM that may include tool calls.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Text content from the LLM (may be empty if only tool calls).
    pub content: String,
    /// Tool calls requested by the LLM.
    pub tool_calls: Vec<ToolCall>,
}

impl LlmResponse {
    /// Creates a response with only text content.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Creates a response with tool calls.
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }

    /// Returns true if this response contains tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_as_str() {
        assert_eq!(Role::System.as_str(), "system");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }

    #[test]
    fn test_message_constructors() {
        let system = Message::system("You are a SQL assistant.");
        assert_eq!(system.role, Role::System);
        assert_eq!(system.content, "You are a SQL assistant.");

        let user = Message::user("List all the users");
        assert_eq!(user.role, Role::User);

        let assistant = Message::assistant("Done.");
        assert_eq!(assistant.role, Role::Assistant);
    }

    #[test]
    fn test_llm_response_tool_calls() {
        let response = LlmResponse::text("hello");
        assert!(!response.has_tool_calls());

        let response = LlmResponse::with_tool_calls(
            String::new(),
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "run_sql".to_string(),
                arguments: r#"{"query":"SELECT 1"}"#.to_string(),
            }],
        );
        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls[0].name, "run_sql");
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::User).unwrap();
        assert_eq!(json, "\"user\"");

        let deserialized: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, Role::User);
    }
}
