//! Natural-language query gateway for PostgreSQL.
//!
//! Turns free-text questions into structured JSON answers in three stages:
//! an intent classifier decides whether the user wants rows or a chart, an
//! LLM-driven agent queries the database through a `run_sql` tool, and a
//! structuring stage converts the agent's prose into a validated
//! [`response::GatewayResponse`].

pub mod agent;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod intent;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod response;
pub mod safety;
pub mod structure;

pub use error::{GatewayError, Result};
pub use intent::Intent;
pub use pipeline::Gateway;
pub use response::{ChartResult, GatewayResponse, TabularResult};
