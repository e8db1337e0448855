//! Query intent classification.
//!
//! The first pipeline stage asks the LLM whether a query wants raw data
//! back or a chart. The reply must be a bare JSON object with a single
//! `value` field; anything else is a hard classification failure, with no
//! fallback tier.

use serde::Deserialize;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::llm::{LlmClient, Message};

/// What the user wants done with their query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Retrieve rows and present them as a table.
    Search,
    /// Aggregate data and present it as a chart.
    Visualize,
}

impl Intent {
    /// Returns the wire label for this intent.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "SEARCH",
            Self::Visualize => "VISUALIZE",
        }
    }

    fn from_label(label: &str) -> Result<Self> {
        match label.trim() {
            "SEARCH" => Ok(Self::Search),
            "VISUALIZE" => Ok(Self::Visualize),
            other => Err(GatewayError::classification(format!(
                "Unknown intent label: {:?}",
                other
            ))),
        }
    }
}

impl std::str::FromStr for Intent {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_label(&s.to_uppercase())
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct IntentEnvelope {
    value: String,
}

const CLASSIFIER_PROMPT: &str = "\
You classify the intent of user queries against an inventory database.

Classify the query as exactly one of:
- SEARCH: the user wants specific records, lists, lookups, or details.
- VISUALIZE: the user wants a chart, graph, trend, distribution, \
comparison, or aggregated breakdown.

Respond with ONLY a JSON object of the form {\"value\": \"SEARCH\"} or \
{\"value\": \"VISUALIZE\"}. No markdown, no explanation.";

/// Classifies a query as SEARCH or VISUALIZE.
///
/// The LLM reply is parsed strictly; a malformed reply or unknown label
/// fails the whole request.
pub async fn classify(llm: &dyn LlmClient, query: &str) -> Result<Intent> {
    let messages = vec![Message::system(CLASSIFIER_PROMPT), Message::user(query)];

    let raw = llm.complete(&messages).await?;
    debug!(raw = %raw, "intent classifier reply");

    let envelope: IntentEnvelope = serde_json::from_str(raw.trim()).map_err(|e| {
        GatewayError::classification(format!(
            "Classifier did not return valid JSON ({}): {}",
            e, raw
        ))
    })?;

    Intent::from_label(&envelope.value)
}
