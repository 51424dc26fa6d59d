//! Error Types for Agent Kinds

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KindsError>;

#[derive(Error, Debug)]
pub enum KindsError {
    #[error("Wikipedia lookup failed: {0}")]
    Lookup(String),

    #[error("Unsupported language code: {0}")]
    UnsupportedLanguage(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<KindsError> for AgentError {
    fn from(err: KindsError) -> Self {
        match err {
            KindsError::Network(e) => AgentError::ProviderUnavailable(e.to_string()),
            KindsError::UnsupportedLanguage(lang) => AgentError::Config(format!("unsupported language '{lang}'")),
            other => AgentError::ToolExecution(other.to_string()),
        }
    }
}
