//! The query pipeline.
//!
//! `Gateway` wires the three stages together: classify the query's intent,
//! run the SQL agent, structure the answer. Both the LLM and the database
//! are injected as trait objects so every stage runs against mocks in tests.

use tracing::info;

use crate::agent::SqlAgent;
use crate::db::DatabaseClient;
use crate::error::Result;
use crate::intent::{self, Intent};
use crate::llm::LlmClient;
use crate::response::GatewayResponse;
use crate::safety::ExecutionPolicy;
use crate::structure;

/// The natural-language query gateway.
pub struct Gateway {
    llm: Box<dyn LlmClient>,
    db: Box<dyn DatabaseClient>,
    policy: ExecutionPolicy,
}

impl Gateway {
    /// Creates a gateway over the given LLM and database clients.
    pub fn new(llm: Box<dyn LlmClient>, db: Box<dyn DatabaseClient>) -> Self {
        Self {
            llm,
            db,
            policy: ExecutionPolicy::default(),
        }
    }

    /// Sets the execution policy for agent-generated SQL.
    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Handles a query end to end, classifying its intent first.
    pub async fn handle(&self, query: &str) -> Result<GatewayResponse> {
        let intent = intent::classify(self.llm.as_ref(), query).await?;
        info!(intent = %intent, "classified query");
        self.run_stages(query, intent).await
    }

    /// Handles a query with a caller-supplied intent, skipping classification.
    pub async fn handle_with_intent(
        &self,
        query: &str,
        intent: Intent,
    ) -> Result<GatewayResponse> {
        self.run_stages(query, intent).await
    }

    async fn run_stages(&self, query: &str, intent: Intent) -> Result<GatewayResponse> {
        let agent = SqlAgent::new(self.llm.as_ref(), self.db.as_ref(), self.policy);
        let outcome = agent.execute(query, intent).await?;
        info!(
            sql_captured = outcome.sql_used.is_some(),
            "agent produced answer"
        );

        structure::structure(self.llm.as_ref(), query, intent, &outcome).await
    }

    /// Closes the underlying database connection.
    pub async fn close(&self) -> Result<()> {
        self.db.close().await
    }
}
