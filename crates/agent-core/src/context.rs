//! Utility Context & Dependency Matching
//!
//! A context owns the pool of utility instances available to agents.
//! `inject` fills each slot of a dependency schema with the first pooled
//! utility whose type or declared capability matches, then runs the result
//! through the ordinary validator so unfilled required slots surface as
//! `deps.missing`.
//!
//! Capabilities are explicit: a utility declares which interfaces it
//! satisfies when it is registered. Nothing is discovered by method name.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::Result;
use crate::schema::{FieldType, FieldValue, Schema, short_type_name};
use crate::tool::Tool;
use crate::validation::{Payload, Section, Validated, validate};

/// Capability interfaces a dependency slot can ask for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Implements [`RagExpander`]
    RagExpander,
    /// Implements [`Tool`]
    Tool,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Capability::RagExpander => "RagExpander",
            Capability::Tool => "Tool",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Capability::RagExpander => "Instance implementing expand(query) -> text.",
            Capability::Tool => "Instance implementing the agent tool interface.",
        }
    }
}

/// Retrieval expansion: contextual text for a query
pub trait RagExpander: Send + Sync {
    fn expand(&self, query: &str) -> String;
}

/// A registered utility instance
#[derive(Clone)]
pub struct Utility {
    type_id: TypeId,
    type_name: &'static str,
    instance: Arc<dyn Any + Send + Sync>,
    expander: Option<Arc<dyn RagExpander>>,
    tool: Option<Arc<dyn Tool>>,
}

impl Utility {
    /// Plain instance with no capabilities
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Share an existing instance
    pub fn from_arc<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: short_type_name(std::any::type_name::<T>()),
            instance: value,
            expander: None,
            tool: None,
        }
    }

    /// Instance declaring the [`Capability::RagExpander`] capability
    pub fn expander<T: RagExpander + 'static>(value: T) -> Self {
        let value = Arc::new(value);
        let mut utility = Self::from_arc(value.clone());
        utility.expander = Some(value);
        utility
    }

    /// Instance declaring the [`Capability::Tool`] capability
    pub fn tool<T: Tool + 'static>(value: T) -> Self {
        let value = Arc::new(value);
        let mut utility = Self::from_arc(value.clone());
        utility.tool = Some(value);
        utility
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::RagExpander => self.expander.is_some(),
            Capability::Tool => self.tool.is_some(),
        }
    }

    /// Type match: same concrete type first, then declared capability
    pub fn satisfies(&self, expected: &FieldType) -> bool {
        match expected {
            FieldType::Any => true,
            FieldType::Instance { type_id, .. } => self.type_id == *type_id,
            FieldType::Capability(capability) => self.has(*capability),
            _ => false,
        }
    }

    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.instance.clone().downcast::<T>().ok()
    }

    pub fn as_expander(&self) -> Option<Arc<dyn RagExpander>> {
        self.expander.clone()
    }

    pub fn as_tool(&self) -> Option<Arc<dyn Tool>> {
        self.tool.clone()
    }
}

impl PartialEq for Utility {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.instance), Arc::as_ptr(&other.instance))
    }
}

impl std::fmt::Debug for Utility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Utility")
            .field("type_name", &self.type_name)
            .field("expander", &self.expander.is_some())
            .field("tool", &self.tool.is_some())
            .finish()
    }
}

/// Ordered pool of utilities; matching is first-registered-wins
#[derive(Clone, Debug, Default)]
pub struct UtilityPool {
    utilities: Vec<Utility>,
}

impl UtilityPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, utility: Utility) {
        self.utilities.push(utility);
    }

    /// First utility satisfying `expected`
    pub fn find(&self, expected: &FieldType) -> Option<&Utility> {
        self.utilities.iter().find(|u| u.satisfies(expected))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utility> {
        self.utilities.iter()
    }

    pub fn len(&self) -> usize {
        self.utilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utilities.is_empty()
    }
}

/// Utilities and tools an application makes available to its agents
#[derive(Clone, Default)]
pub struct AgentContext {
    utilities: UtilityPool,
    tools: Vec<Arc<dyn Tool>>,
}

impl AgentContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_utility(mut self, utility: Utility) -> Self {
        self.utilities.register(utility);
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn utilities(&self) -> &UtilityPool {
        &self.utilities
    }

    /// Tools handed to every agent alongside its dependencies
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }

    /// Build a dependency object for `schema` from the pool.
    ///
    /// Returns `Ok(None)` when the agent declares no dependencies. Slots
    /// without a matching utility are left unset; required ones then fail
    /// as `deps.missing`.
    pub fn inject(&self, schema: Option<&Schema>) -> Result<Option<Validated>> {
        let Some(schema) = schema else {
            return Ok(None);
        };

        let mut payload = Payload::fields();
        for slot in schema.fields() {
            match self.utilities.find(&slot.ty) {
                Some(utility) => {
                    tracing::debug!(slot = %slot.name, utility = utility.type_name(), "dependency matched");
                    payload = payload.with(slot.name.clone(), FieldValue::Utility(utility.clone()));
                }
                None => tracing::debug!(slot = %slot.name, "no utility for dependency slot"),
            }
        }

        validate(schema.name(), Some(schema), payload, Section::Deps)
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("utilities", &self.utilities)
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::AgentError;
    use crate::schema::FieldSpec;
    use crate::tool::{ToolCall, ToolResult, ToolSchema};

    struct StaticRag(&'static str);

    impl RagExpander for StaticRag {
        fn expand(&self, query: &str) -> String {
            format!("{} :: {query}", self.0)
        }
    }

    struct Ledger {
        entries: Vec<String>,
    }

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema::new(self.0, "test tool")
        }

        async fn execute(&self, _call: &ToolCall) -> Result<ToolResult> {
            Ok(ToolResult::success(self.0, "ok"))
        }
    }

    fn deps_schema() -> Schema {
        Schema::new("SampleDeps")
            .field(FieldSpec::capability("rag", Capability::RagExpander))
            .field(FieldSpec::instance::<Ledger>("ledger").optional())
    }

    #[test]
    fn test_no_schema_injects_nothing() {
        let ctx = AgentContext::new().with_utility(Utility::expander(StaticRag("a")));
        assert!(ctx.inject(None).unwrap().is_none());
    }

    #[test]
    fn test_capability_and_concrete_type_matching() {
        let ctx = AgentContext::new()
            .with_utility(Utility::new(Ledger { entries: vec!["one".into()] }))
            .with_utility(Utility::expander(StaticRag("ctx")));

        let deps = ctx.inject(Some(&deps_schema())).unwrap().unwrap();

        let rag = deps.expander("rag").unwrap();
        assert_eq!(rag.expand("q"), "ctx :: q");

        let ledger = deps.instance::<Ledger>("ledger").unwrap();
        assert_eq!(ledger.entries, vec!["one".to_string()]);
    }

    #[test]
    fn test_first_registered_wins() {
        let ctx = AgentContext::new()
            .with_utility(Utility::expander(StaticRag("first")))
            .with_utility(Utility::expander(StaticRag("second")));

        let deps = ctx.inject(Some(&deps_schema())).unwrap().unwrap();
        assert_eq!(deps.expander("rag").unwrap().expand("q"), "first :: q");
    }

    #[test]
    fn test_injection_is_deterministic() {
        let ctx = AgentContext::new()
            .with_utility(Utility::expander(StaticRag("a")))
            .with_utility(Utility::new(Ledger { entries: vec![] }));

        let first = ctx.inject(Some(&deps_schema())).unwrap();
        let second = ctx.inject(Some(&deps_schema())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unmatched_required_slot_is_missing() {
        let ctx = AgentContext::new().with_utility(Utility::new(Ledger { entries: vec![] }));

        let err = ctx.inject(Some(&deps_schema())).unwrap_err();
        let AgentError::Validation(failure) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(failure.section, Section::Deps);
        assert_eq!(failure.errors.len(), 1);
        assert_eq!(failure.errors[0].code, "deps.missing");
        assert_eq!(failure.errors[0].pointer(), Some("/rag"));
    }

    #[test]
    fn test_unmatched_optional_slot_defaults_to_null() {
        let ctx = AgentContext::new().with_utility(Utility::expander(StaticRag("a")));
        let deps = ctx.inject(Some(&deps_schema())).unwrap().unwrap();
        assert!(deps.get("ledger").unwrap().is_null());
        assert!(deps.instance::<Ledger>("ledger").is_none());
    }

    #[test]
    fn test_tool_capability_exposed_from_deps() {
        let schema = Schema::new("ToolDeps").field(FieldSpec::capability("search", Capability::Tool).optional());
        let ctx = AgentContext::new()
            .with_utility(Utility::expander(StaticRag("a")))
            .with_utility(Utility::tool(NamedTool("wikipedia")));

        let deps = ctx.inject(Some(&schema)).unwrap().unwrap();
        let tools = deps.tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "wikipedia");
    }

    #[test]
    fn test_wrong_instance_in_explicit_payload() {
        let payload = Payload::fields().with("rag", Utility::new(Ledger { entries: vec![] }));
        let err = validate("Sample", Some(&deps_schema()), payload, Section::Deps).unwrap_err();
        let failure = err.as_validation().unwrap();
        assert_eq!(failure.errors[0].code, "deps.validation");
        assert_eq!(failure.errors[0].meta.as_ref().unwrap().kind, "is_instance_of");
    }
}
