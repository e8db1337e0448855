//! Mock LLM client for testing.
//!
//! Supports two modes: a scripted queue of responses consumed in order, and
//! a pattern-matching fallback that recognizes the classification, agent,
//! and structuring prompts so the full pipeline can run offline.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::Result;
use crate::llm::types::{LlmResponse, Message, Role, ToolCall, ToolExchange};
use crate::llm::{LlmClient, ToolDefinition};

/// A mock LLM client that returns canned responses.
pub struct MockLlmClient {
    scripted: Mutex<VecDeque<LlmResponse>>,
    /// Wraps structured JSON output in markdown code fences, mimicking
    /// models that ignore bare-JSON instructions.
    fenced_json: bool,
}

impl MockLlmClient {
    /// Creates a mock client using pattern-matching behavior.
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fenced_json: false,
        }
    }

    /// Creates a mock client that replies with the given responses in order.
    /// Once the queue is exhausted, pattern matching takes over.
    pub fn with_responses(responses: Vec<LlmResponse>) -> Self {
        Self {
            scripted: Mutex::new(responses.into()),
            fenced_json: false,
        }
    }

    /// Makes the mock wrap structured JSON replies in ```json fences.
    pub fn with_fenced_json(mut self) -> Self {
        self.fenced_json = true;
        self
    }

    /// Queues an additional scripted response.
    pub fn push_response(&self, response: LlmResponse) {
        self.scripted
            .lock()
            .expect("scripted lock poisoned")
            .push_back(response);
    }

    fn next_scripted(&self) -> Option<LlmResponse> {
        self.scripted
            .lock()
            .expect("scripted lock poisoned")
            .pop_front()
    }

    fn last_user_content(messages: &[Message]) -> &str {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    fn all_content(messages: &[Message]) -> String {
        messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .to_lowercase()
    }

    fn maybe_fence(&self, json: String) -> String {
        if self.fenced_json {
            format!("```json\n{}\n```", json)
        } else {
            json
        }
    }

    /// Pattern-matching reply for plain completions.
    fn pattern_complete(&self, messages: &[Message]) -> String {
        let prompt = Self::all_content(messages);
        let query = Self::last_user_content(messages).to_lowercase();

        // Classification prompt mentions both intent labels.
        if prompt.contains("search") && prompt.contains("visualize") && prompt.contains("intent") {
            let wants_chart = query.contains("chart")
                || query.contains("plot")
                || query.contains("graph")
                || query.contains("visuali")
                || query.contains("distribution")
                || (query.contains(" by ")
                    && (query.contains("count") || query.contains("show")));
            let value = if wants_chart { "VISUALIZE" } else { "SEARCH" };
            return format!(r#"{{"value": "{}"}}"#, value);
        }

        // Chart structuring prompt.
        if prompt.contains("chart_type") {
            return self.maybe_fence(Self::chart_json());
        }

        // Tabular structuring prompt.
        if prompt.contains("tabular") {
            return self.maybe_fence(Self::tabular_json());
        }

        "Mock response".to_string()
    }

    fn chart_json() -> String {
        serde_json::json!({
            "query": "Show me the count of products by category",
            "chart_type": "bar",
            "title": "Products by Category",
            "description": "Number of products in each category",
            "data": [
                {"category": "Electronics", "product_count": 4},
                {"category": "Books", "product_count": 3},
                {"category": "Clothing", "product_count": 2},
                {"category": "Toys", "product_count": 1}
            ],
            "x_axis_key": "category",
            "y_axis_keys": ["product_count"]
        })
        .to_string()
    }

    fn tabular_json() -> String {
        serde_json::json!({
            "message": "Found 3 users.",
            "query": "List all the users",
            "content": [
                {"user_id": "6f1c2a18-1111-4a8e-9c3f-000000000001",
                 "name": "Alice", "email": "alice@example.com"},
                {"user_id": "6f1c2a18-1111-4a8e-9c3f-000000000002",
                 "name": "Bob", "email": "bob@example.com"},
                {"user_id": "6f1c2a18-1111-4a8e-9c3f-000000000003",
                 "name": "Carol", "email": "carol@example.com"}
            ]
        })
        .to_string()
    }

    /// Picks a plausible SQL statement for the agent to run.
    fn sql_for_query(query: &str) -> String {
        let query = query.to_lowercase();
        if query.contains("count") && (query.contains("categor") || query.contains(" by ")) {
            "SELECT c.name AS category, COUNT(p.id) AS product_count \
             FROM categories c JOIN products p ON p.category_id = c.id \
             GROUP BY c.name ORDER BY product_count DESC"
                .to_string()
        } else if query.contains("user") {
            "SELECT user_id, name, email FROM users".to_string()
        } else if query.contains("categor") {
            "SELECT id, name FROM categories".to_string()
        } else {
            "SELECT id, category_id, name, price FROM products".to_string()
        }
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        if let Some(scripted) = self.next_scripted() {
            return Ok(scripted.content);
        }
        Ok(self.pattern_complete(messages))
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        if let Some(scripted) = self.next_scripted() {
            return Ok(scripted);
        }

        let query = Self::last_user_content(messages);
        let sql = Self::sql_for_query(query);
        let arguments = serde_json::json!({ "query": sql }).to_string();

        Ok(LlmResponse::with_tool_calls(
            String::new(),
            vec![ToolCall {
                id: "call_mock_1".to_string(),
                name: "run_sql".to_string(),
                arguments,
            }],
        ))
    }

    async fn continue_with_tool_results(
        &self,
        _messages: &[Message],
        exchanges: &[ToolExchange],
        _tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        if let Some(scripted) = self.next_scripted() {
            return Ok(scripted);
        }

        let results = exchanges
            .last()
            .map(|e| {
                e.results
                    .iter()
                    .map(|r| r.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        Ok(LlmResponse::text(format!(
            "Query results:\n{}",
            results
        )))
    }
}
