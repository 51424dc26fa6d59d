//! Agent Contract
//!
//! An agent declares, at the type level, the schema of its configuration
//! and of its dependencies, and implements one `execute` step. Everything
//! around that step is shared:
//!
//! ```text
//! PreparedAgent::new
//!   validate config ──▶ validate deps ──▶ merge tools (deps first)
//!                                                  │
//! PreparedAgent::resolve(instruction) ──▶ Agent::execute(...)
//! ```
//!
//! A rejected config or dependency block means `execute` is never called.
//! Errors raised by `execute` reach the caller unchanged.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::{Schema, short_type_name};
use crate::tool::{Tool, merge_tools};
use crate::validation::{Payload, Section, Validated, ValidationReport, lookup, validate};

/// Contract every agent implements
#[async_trait]
pub trait Agent: Send + Sync {
    /// Name used in error details and exported schemas
    fn agent_name() -> &'static str
    where
        Self: Sized,
    {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Configuration schema; `None` means the agent takes no configuration
    fn config_schema() -> Option<Schema>
    where
        Self: Sized,
    {
        None
    }

    /// Dependency schema; `None` means the agent takes no dependencies
    fn dependency_schema() -> Option<Schema>
    where
        Self: Sized,
    {
        None
    }

    /// Check a configuration payload without building an agent
    fn lookup_config(payload: impl Into<Payload>) -> Result<ValidationReport>
    where
        Self: Sized,
    {
        lookup(Self::agent_name(), Self::config_schema().as_ref(), payload, Section::Config)
    }

    /// Check a dependency payload without building an agent
    fn lookup_deps(payload: impl Into<Payload>) -> Result<ValidationReport>
    where
        Self: Sized,
    {
        lookup(Self::agent_name(), Self::dependency_schema().as_ref(), payload, Section::Deps)
    }

    /// Run the agent against already-validated inputs
    async fn execute(
        &self,
        instruction: &str,
        cfg: Option<&Validated>,
        deps: Option<&Validated>,
        tools: &[Arc<dyn Tool>],
    ) -> Result<String>;
}

/// An agent bound to validated configuration, dependencies and tools.
///
/// Immutable once built.
pub struct PreparedAgent<A> {
    agent: A,
    config: Option<Validated>,
    deps: Option<Validated>,
    tools: Vec<Arc<dyn Tool>>,
}

impl<A: Agent> PreparedAgent<A> {
    /// Validate config then deps, then merge tools.
    ///
    /// Tools carried by the validated dependencies come first; an explicit
    /// tool is added only if its name is not taken.
    pub fn new(
        agent: A,
        config: impl Into<Payload>,
        deps: impl Into<Payload>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Result<Self> {
        let name = A::agent_name();

        tracing::debug!(agent = name, "validating config");
        let config = validate(name, A::config_schema().as_ref(), config, Section::Config)?;

        tracing::debug!(agent = name, "validating deps");
        let deps = validate(name, A::dependency_schema().as_ref(), deps, Section::Deps)?;

        let from_deps = deps.as_ref().map(Validated::tools).unwrap_or_default();
        let tools = merge_tools(from_deps, tools);
        tracing::debug!(agent = name, tools = tools.len(), "agent prepared");

        Ok(Self {
            agent,
            config,
            deps,
            tools,
        })
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn config(&self) -> Option<&Validated> {
        self.config.as_ref()
    }

    pub fn deps(&self) -> Option<&Validated> {
        self.deps.as_ref()
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Execute with the bound inputs
    pub async fn resolve(&self, instruction: &str) -> Result<String> {
        tracing::debug!(agent = A::agent_name(), "executing");
        self.agent
            .execute(instruction, self.config.as_ref(), self.deps.as_ref(), &self.tools)
            .await
    }
}

impl<A> std::fmt::Debug for PreparedAgent<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedAgent")
            .field("config", &self.config)
            .field("deps", &self.deps)
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Validate, then execute once
pub async fn resolve<A: Agent>(
    agent: A,
    instruction: &str,
    config: impl Into<Payload>,
    deps: impl Into<Payload>,
) -> Result<String> {
    PreparedAgent::new(agent, config, deps, Vec::new())?
        .resolve(instruction)
        .await
}
