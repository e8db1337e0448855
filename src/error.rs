//! Error types for the gateway.
//!
//! Defines the main error enum used throughout the pipeline. Every failure
//! either recovers through the single structuring fallback or propagates
//! unmodified to the caller; nothing is swallowed.

use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The classifier's model output did not parse into the Intent schema.
    #[error("Classification error: {0}")]
    Classification(String),

    /// Database connection failure, SQL failure inside the agent, or a
    /// failed agent tool invocation.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Both the primary and fallback structuring attempts failed to produce
    /// schema-conformant output.
    #[error("Structuring error: {0}")]
    Structuring(String),

    /// A response's list-valued field contained a non-mapping element, or an
    /// enumerated field held an out-of-set value.
    #[error("Schema validation error: {0}")]
    SchemaValidation(String),

    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM API errors (rate limits, auth, timeouts, etc.)
    #[error("LLM error: {0}")]
    Llm(String),
}

impl GatewayError {
    /// Creates a classification error with the given message.
    pub fn classification(msg: impl Into<String>) -> Self {
        Self::Classification(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a structuring error with the given message.
    pub fn structuring(msg: impl Into<String>) -> Self {
        Self::Structuring(msg.into())
    }

    /// Creates a schema validation error with the given message.
    pub fn schema_validation(msg: impl Into<String>) -> Self {
        Self::SchemaValidation(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Classification(_) => "Classification Error",
            Self::Execution(_) => "Execution Error",
            Self::Structuring(_) => "Structuring Error",
            Self::SchemaValidation(_) => "Schema Validation Error",
            Self::Connection(_) => "Connection Error",
            Self::Config(_) => "Configuration Error",
            Self::Llm(_) => "LLM Error",
        }
    }
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;
