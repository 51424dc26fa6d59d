//! Error Types

use thiserror::Error;

use crate::validation::{Section, ValidationFailure};

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration or dependency payload failed schema validation
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// Payload was neither a validated object, a map, nor absent.
    /// This is a caller bug and is never folded into a validation report.
    #[error("{section} must be {expected}, a map or null (got {got})")]
    PayloadShape {
        section: Section,
        expected: String,
        got: String,
    },

    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Authentication failed (missing or rejected credential)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Maximum iterations reached in reasoning loop
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Schema definition error (bad pattern, duplicate field)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Validation failure details, if this is one
    pub fn as_validation(&self) -> Option<&ValidationFailure> {
        match self {
            AgentError::Validation(failure) => Some(failure),
            _ => None,
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Validation(failure) => {
                format!("Invalid {}: {} problem(s) found.", failure.section, failure.errors.len())
            }
            AgentError::Provider(msg) => format!("The AI service encountered an error: {}", msg),
            AgentError::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            AgentError::Auth(_) => "Authentication failed. Please check your credentials.".into(),
            AgentError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            AgentError::ToolValidation(msg) => format!("Invalid tool input: {}", msg),
            AgentError::ToolExecution(msg) => format!("Tool error: {}", msg),
            AgentError::MaxIterations(_) => "The request took too long to process. Please try a simpler query.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
