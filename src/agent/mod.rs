//! The SQL agent.
//!
//! Runs a tool-calling loop against the LLM: the model sees the database
//! schema, requests `run_sql` executions, reads the rendered rows, and
//! eventually answers in prose. The agent records which SQL produced the
//! answer so downstream stages never have to guess.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::db::DatabaseClient;
use crate::error::{GatewayError, Result};
use crate::intent::Intent;
use crate::llm::{LlmClient, Message, ToolDefinition, ToolExchange, ToolResult};
use crate::safety::ExecutionPolicy;

/// Maximum tool-calling rounds before the agent gives up.
const MAX_AGENT_STEPS: usize = 5;

/// Appended to visualization queries so the agent aggregates.
const VISUALIZE_HINT: &str =
    "Provide data suitable for visualization with aggregated or grouped results.";

/// What the agent produced: a prose answer plus the SQL behind it.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// The agent's final natural-language answer, including any data it
    /// chose to quote.
    pub summary: String,
    /// The first SQL statement the agent ran, if it ran any.
    pub sql_used: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunSqlArgs {
    query: String,
}

/// LLM-driven SQL agent bound to one database connection.
pub struct SqlAgent<'a> {
    llm: &'a dyn LlmClient,
    db: &'a dyn DatabaseClient,
    policy: ExecutionPolicy,
}

impl<'a> SqlAgent<'a> {
    /// Creates an agent over the given LLM and database.
    pub fn new(llm: &'a dyn LlmClient, db: &'a dyn DatabaseClient, policy: ExecutionPolicy) -> Self {
        Self { llm, db, policy }
    }

    /// The single tool the agent may call.
    fn run_sql_tool() -> ToolDefinition {
        ToolDefinition {
            name: "run_sql".to_string(),
            description: "Execute a SQL statement against the PostgreSQL database \
                          and return the resulting rows as text."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The SQL statement to execute."
                    }
                },
                "required": ["query"]
            }),
        }
    }

    fn system_prompt(schema_text: &str) -> String {
        format!(
            "You are a SQL assistant for a PostgreSQL database. Answer the \
             user's question by querying the database with the run_sql tool.\n\
             \n\
             Rules:\n\
             - Use only tables and columns from the schema below.\n\
             - Prefer a single query; join and aggregate in SQL rather than \
             in prose.\n\
             - After you have the data, answer concisely and include the \
             relevant values.\n\
             \n\
             Database schema:\n{}",
            schema_text
        )
    }

    /// Runs the agent loop for the given query.
    ///
    /// For visualization queries the user message carries an extra hint so
    /// the model aggregates instead of dumping raw rows. Failed SQL is fed
    /// back to the model as the tool result so it can correct itself;
    /// statements the execution policy forbids fail the whole request.
    pub async fn execute(&self, query: &str, intent: Intent) -> Result<AgentOutcome> {
        let schema = self.db.introspect_schema().await?;
        let schema_text = schema.format_for_llm();

        let user_query = match intent {
            Intent::Search => query.to_string(),
            Intent::Visualize => format!("{} {}", query, VISUALIZE_HINT),
        };

        let messages = vec![
            Message::system(Self::system_prompt(&schema_text)),
            Message::user(user_query),
        ];
        let tools = [Self::run_sql_tool()];

        let mut exchanges: Vec<ToolExchange> = Vec::new();
        let mut sql_used: Option<String> = None;

        let mut response = self.llm.complete_with_tools(&messages, &tools).await?;

        for step in 0..MAX_AGENT_STEPS {
            if !response.has_tool_calls() {
                if response.content.trim().is_empty() {
                    return Err(GatewayError::execution(
                        "Agent returned neither an answer nor a tool call",
                    ));
                }
                info!(steps = step, sql_captured = sql_used.is_some(), "agent finished");
                return Ok(AgentOutcome {
                    summary: response.content,
                    sql_used,
                });
            }

            let mut results = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                let content = match call.name.as_str() {
                    "run_sql" => {
                        let args: RunSqlArgs =
                            serde_json::from_str(&call.arguments).map_err(|e| {
                                GatewayError::execution(format!(
                                    "Agent produced invalid run_sql arguments: {}",
                                    e
                                ))
                            })?;
                        self.run_sql(&args.query, &mut sql_used).await?
                    }
                    other => {
                        warn!(tool = other, "agent requested unknown tool");
                        format!("Unknown tool: {}", other)
                    }
                };
                results.push(ToolResult {
                    tool_call_id: call.id.clone(),
                    content,
                });
            }

            exchanges.push(ToolExchange {
                assistant_content: response.content.clone(),
                calls: response.tool_calls.clone(),
                results,
            });

            response = self
                .llm
                .continue_with_tool_results(&messages, &exchanges, &tools)
                .await?;
        }

        Err(GatewayError::execution(format!(
            "Agent exceeded {} tool-calling rounds without answering",
            MAX_AGENT_STEPS
        )))
    }

    /// Executes one agent-requested statement.
    ///
    /// Policy violations are hard errors. Database errors become the tool
    /// result text so the model can revise its SQL.
    async fn run_sql(&self, sql: &str, sql_used: &mut Option<String>) -> Result<String> {
        self.policy.check(sql)?;

        if sql_used.is_none() {
            *sql_used = Some(sql.to_string());
        }

        debug!(sql = %sql, "agent executing SQL");
        match self.db.execute_query(sql).await {
            Ok(result) => Ok(result.render_for_agent()),
            Err(e) => {
                warn!("agent SQL failed: {}", e);
                Ok(format!("SQL error: {}", e))
            }
        }
    }
}
