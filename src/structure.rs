//! Result structuring.
//!
//! Turns the agent's prose answer into a validated `GatewayResponse`.
//! Structuring is two-tier: a strict first attempt, then one retry whose
//! reply is stripped of markdown code fences before parsing. If both fail
//! the request fails with the raw model output in the logs.

use tracing::{debug, warn};

use crate::agent::AgentOutcome;
use crate::error::{GatewayError, Result};
use crate::intent::Intent;
use crate::llm::{LlmClient, Message};
use crate::response::{ChartResult, GatewayResponse, TabularResult};

/// Stands in for the executed SQL when the agent answered without running
/// any statement.
const SQL_NOT_CAPTURED: &str = "SQL query not captured";

const TABULAR_PROMPT: &str = "\
You convert a database assistant's answer into a tabular JSON result.

Respond with ONLY a JSON object with these fields:
- \"message\": a short natural-language summary of the result.
- \"query\": the user's original question, verbatim.
- \"content\": an array of flat JSON objects, one per result row, keyed \
by column name. Use an empty array if the answer contains no rows.

Every element of \"content\" must be an object. Output bare JSON with no \
markdown fences and no commentary.";

const CHART_PROMPT: &str = "\
You convert a database assistant's answer into a chart specification.

Respond with ONLY a JSON object with these fields:
- \"query\": the user's original question, verbatim.
- \"chart_type\": one of \"line\", \"bar\", \"area\", \"pie\", \"donut\", \
\"radar\", \"radial\", \"composed\".
- \"title\": a short chart title.
- \"description\": one sentence describing what the chart shows.
- \"data\": an array of flat JSON objects, one per data point.
- \"x_axis_key\": the key in each data object used for the x axis.
- \"y_axis_keys\": an array of keys plotted as series.
- \"colors\" (optional): hex color strings, one per series.
- \"show_legend\" and \"show_grid\" (optional): booleans.

Choose the chart type that fits the data: categories compare best as \
\"bar\" or \"pie\", time series as \"line\" or \"area\", part-of-whole \
breakdowns as \"pie\" or \"donut\". Every key named in \"x_axis_key\" and \
\"y_axis_keys\" must exist in every data object. Output bare JSON with no \
markdown fences and no commentary.";

/// Structures the agent's answer according to the classified intent.
pub async fn structure(
    llm: &dyn LlmClient,
    query: &str,
    intent: Intent,
    outcome: &AgentOutcome,
) -> Result<GatewayResponse> {
    let system = match intent {
        Intent::Search => TABULAR_PROMPT,
        Intent::Visualize => CHART_PROMPT,
    };

    let sql = outcome.sql_used.as_deref().unwrap_or(SQL_NOT_CAPTURED);
    let user = format!(
        "User question: {}\n\nSQL executed: {}\n\nAssistant answer:\n{}",
        query, sql, outcome.summary
    );
    let messages = vec![Message::system(system), Message::user(user)];

    // Tier 1: strict parse of a fresh completion.
    let raw = llm.complete(&messages).await?;
    match parse_response(intent, &raw) {
        Ok(response) => return Ok(response),
        Err(e) => {
            debug!("strict structuring parse failed, retrying with fence stripping: {}", e);
        }
    }

    // Tier 2: a second completion, tolerant of markdown fences.
    let raw = llm.complete(&messages).await?;
    let stripped = strip_code_fences(&raw);
    parse_response(intent, stripped).map_err(|e| {
        warn!(raw = %raw, "structuring fallback failed");
        GatewayError::structuring(format!("Fallback structuring attempt failed: {}", e))
    })
}

fn parse_response(intent: Intent, raw: &str) -> Result<GatewayResponse> {
    match intent {
        Intent::Search => TabularResult::from_json_str(raw.trim()).map(GatewayResponse::Tabular),
        Intent::Visualize => ChartResult::from_json_str(raw.trim()).map(GatewayResponse::Chart),
    }
}

/// Removes a leading ```json (or bare ```) fence and a trailing ``` fence.
fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, MockLlmClient};

    fn tabular_outcome() -> AgentOutcome {
        AgentOutcome {
            summary: "Found 3 users: Alice, Bob, Carol.".to_string(),
            sql_used: Some("SELECT user_id, name, email FROM users".to_string()),
        }
    }

    fn chart_outcome() -> AgentOutcome {
        AgentOutcome {
            summary: "Electronics 4, Books 3, Clothing 2, Toys 1.".to_string(),
            sql_used: Some("SELECT c.name, COUNT(*) FROM ...".to_string()),
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn test_structures_tabular_result() {
        let llm = MockLlmClient::new();
        let response = structure(&llm, "List all the users", Intent::Search, &tabular_outcome())
            .await
            .unwrap();

        match response {
            GatewayResponse::Tabular(t) => {
                assert_eq!(t.content.len(), 3);
                assert_eq!(t.content[0]["name"], "Alice");
            }
            GatewayResponse::Chart(_) => panic!("expected tabular result"),
        }
    }

    #[tokio::test]
    async fn test_structures_chart_result() {
        let llm = MockLlmClient::new();
        let response = structure(
            &llm,
            "Show me the count of products by category",
            Intent::Visualize,
            &chart_outcome(),
        )
        .await
        .unwrap();

        match response {
            GatewayResponse::Chart(c) => {
                assert_eq!(c.data.len(), 4);
                assert_eq!(c.x_axis_key, "category");
            }
            GatewayResponse::Tabular(_) => panic!("expected chart result"),
        }
    }

    #[tokio::test]
    async fn test_fallback_strips_fences() {
        // Every reply is fenced: tier 1 fails strict parsing, tier 2
        // succeeds after stripping.
        let llm = MockLlmClient::new().with_fenced_json();
        let response = structure(
            &llm,
            "Show me the count of products by category",
            Intent::Visualize,
            &chart_outcome(),
        )
        .await
        .unwrap();

        assert_eq!(response.kind(), "chart");
    }

    #[tokio::test]
    async fn test_both_tiers_failing_is_structuring_error() {
        let llm = MockLlmClient::with_responses(vec![
            LlmResponse::text("not json"),
            LlmResponse::text("still not json"),
        ]);
        let err = structure(&llm, "List all the users", Intent::Search, &tabular_outcome())
            .await
            .unwrap_err();

        assert_eq!(err.category(), "Structuring Error");
    }

    #[tokio::test]
    async fn test_missing_sql_uses_sentinel() {
        // The sentinel only affects the prompt; structuring still works.
        let outcome = AgentOutcome {
            summary: "The users table has 3 rows.".to_string(),
            sql_used: None,
        };
        let llm = MockLlmClient::new();
        let response = structure(&llm, "List all the users", Intent::Search, &outcome)
            .await
            .unwrap();
        assert_eq!(response.kind(), "tabular");
    }
}
