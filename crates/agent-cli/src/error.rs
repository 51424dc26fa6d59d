//! Run failures and their exit codes

use serde_json::{Value, json};
use thiserror::Error;

use agent_core::validation::ValidationErrorItem;
use agent_core::{AgentError, Section};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error("Error: missing argument (instruction)")]
    MissingInstruction,

    #[error("Invalid config")]
    Config(Vec<ValidationErrorItem>),

    #[error("Invalid dependencies")]
    Deps(Vec<ValidationErrorItem>),

    #[error("Error: {0}")]
    Credential(String),

    #[error("Error running agent: {0}")]
    Execution(#[source] AgentError),
}

impl CliError {
    /// Process exit code
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Usage(_) | CliError::MissingInstruction => 1,
            CliError::Credential(_) => 2,
            CliError::Execution(_) => 3,
            CliError::Config(_) => 5,
            CliError::Deps(_) => 6,
        }
    }

    /// Body written to stderr
    pub fn to_json(&self) -> Value {
        match self {
            CliError::Config(errors) | CliError::Deps(errors) => {
                json!({ "system": self.to_string(), "errors": errors })
            }
            CliError::Execution(err) => json!({ "system": self.to_string(), "message": err.user_message() }),
            _ => json!({ "system": self.to_string() }),
        }
    }

    /// Input rejected while preparing `section`.
    ///
    /// Structured validation failures keep their items; anything else becomes
    /// a single `<section>.error` item.
    pub fn rejected(section: Section, err: AgentError) -> Self {
        let errors = match err {
            AgentError::Validation(failure) => failure.errors,
            other => vec![ValidationErrorItem::error(section, other.to_string())],
        };
        match section {
            Section::Config => CliError::Config(errors),
            Section::Deps => CliError::Deps(errors),
        }
    }

    /// Failure while connecting to the provider
    pub fn connect(err: AgentError) -> Self {
        match err {
            AgentError::Auth(msg) => CliError::Credential(msg),
            other => CliError::Execution(other),
        }
    }
}
