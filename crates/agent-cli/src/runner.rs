//! One agent run, end to end
//!
//! ```text
//! instruction? ─1─▶ config lookup ─5─▶ context + deps ─6─▶ credential ─2─▶ execute ─3─▶ report
//! ```
//!
//! Each arrow's number is the exit code used when that step fails.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use agent_core::validation::ValidationErrorItem;
use agent_core::{
    Agent, AgentContext, CostTotals, CostTracer, LlmProvider, PreparedAgent, RunId, Section, TracedProvider,
    Validated,
};
use agent_kinds::{EchoAgent, KeywordRag, TooledAgent, TooledConfig, context_with};

use crate::cli::{AgentKind, Cli};
use crate::error::CliError;
use crate::report::{CallReport, ReportParams, ReportTotals, RunReport};
use crate::settings::RunSettings;

/// Run the selected agent once.
///
/// `connect` is called only after configuration and dependencies have been
/// accepted, and only by agents that talk to a model.
pub async fn run<F>(cli: &Cli, settings: &RunSettings, connect: F) -> Result<RunReport, CliError>
where
    F: FnOnce() -> agent_core::Result<Arc<dyn LlmProvider>>,
{
    let instruction = cli.instruction.as_deref().ok_or(CliError::MissingInstruction)?;
    let explicit = cli
        .config
        .as_deref()
        .map(|raw| serde_json::from_str::<Value>(raw))
        .transpose()
        .map_err(|e| CliError::rejected(Section::Config, e.into()))?;

    match cli.agent {
        AgentKind::Echo => run_echo(instruction, explicit).await,
        AgentKind::Tooled => run_tooled(instruction, settings.merge(explicit), cli.docs.as_deref(), connect).await,
    }
}

async fn run_echo(instruction: &str, explicit: Option<Value>) -> Result<RunReport, CliError> {
    let started = Instant::now();
    let config = check_config::<EchoAgent>(explicit.unwrap_or(Value::Null))?;
    let deps = inject::<EchoAgent>(&AgentContext::new())?;

    let agent = PreparedAgent::new(EchoAgent, config, deps, Vec::new()).map_err(prepare_error)?;
    let output = agent.resolve(instruction).await.map_err(CliError::Execution)?;

    Ok(RunReport {
        run_id: RunId::new(),
        agent: EchoAgent::agent_name().into(),
        input: instruction.into(),
        output,
        model_requested: None,
        params: None,
        calls: Vec::new(),
        totals: ReportTotals::new(&CostTotals::default(), elapsed_ms(started)),
    })
}

async fn run_tooled<F>(
    instruction: &str,
    payload: Value,
    docs: Option<&Path>,
    connect: F,
) -> Result<RunReport, CliError>
where
    F: FnOnce() -> agent_core::Result<Arc<dyn LlmProvider>>,
{
    let started = Instant::now();
    let config_value = check_config::<TooledAgent>(payload)?;
    let config: TooledConfig =
        serde_json::from_value(config_value.clone()).map_err(|e| CliError::rejected(Section::Config, e.into()))?;

    let rag = match docs {
        Some(path) => KeywordRag::from_paragraphs(&read_docs(path)?),
        None => KeywordRag::new(),
    };
    let ctx = context_with(&config.lang, rag).map_err(|e| CliError::rejected(Section::Deps, e.into()))?;
    let deps = inject::<TooledAgent>(&ctx)?;

    let inner = connect().map_err(CliError::connect)?;
    let tracer = Arc::new(CostTracer::new());
    let run_id = RunId::new();
    let provider = TracedProvider::new(inner)
        .observe(tracer.clone())
        .with_parent(run_id);

    let agent = PreparedAgent::new(TooledAgent::new(Arc::new(provider)), config_value, deps, ctx.tools())
        .map_err(prepare_error)?;

    tracing::info!(%run_id, model = %config.model, "running agent");
    let output = agent.resolve(instruction).await.map_err(CliError::Execution)?;

    let records = tracer.finished();
    Ok(RunReport {
        run_id,
        agent: TooledAgent::agent_name().into(),
        input: instruction.into(),
        output,
        model_requested: Some(config.model),
        params: Some(ReportParams {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }),
        calls: records.iter().map(CallReport::from).collect(),
        totals: ReportTotals::new(&tracer.totals(), elapsed_ms(started)),
    })
}

/// Validated configuration as JSON, `null` when the agent takes none
fn check_config<A: Agent>(payload: Value) -> Result<Value, CliError> {
    let report = A::lookup_config(payload).map_err(|e| CliError::rejected(Section::Config, e))?;
    if !report.ok {
        return Err(CliError::Config(report.errors));
    }
    Ok(report.value.unwrap_or(Value::Null))
}

fn inject<A: Agent>(ctx: &AgentContext) -> Result<Option<Validated>, CliError> {
    ctx.inject(A::dependency_schema().as_ref())
        .map_err(|e| CliError::rejected(Section::Deps, e))
}

fn prepare_error(err: agent_core::AgentError) -> CliError {
    match err.as_validation().map(|f| f.section) {
        Some(section) => CliError::rejected(section, err),
        None => CliError::Execution(err),
    }
}

fn read_docs(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| {
        CliError::Deps(vec![ValidationErrorItem::error(
            Section::Deps,
            format!("{}: {e}", path.display()),
        )])
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use clap::Parser;

    use super::*;
    use agent_core::provider::{Completion, TokenUsage};
    use agent_core::{AgentError, GenerationOptions, Message};

    struct Scripted {
        answer: &'static str,
        seen: Mutex<Vec<GenerationOptions>>,
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _messages: &[Message], options: &GenerationOptions) -> agent_core::Result<Completion> {
            self.seen.lock().unwrap().push(options.clone());
            if self.answer.is_empty() {
                return Err(AgentError::ProviderUnavailable("503 Service Unavailable".into()));
            }
            Ok(Completion {
                content: self.answer.into(),
                model: "gpt-4o-mini-2024-07-18".into(),
                usage: Some(TokenUsage::new(10, 5)),
                request_id: Some("chatcmpl-1".into()),
                finish_reason: None,
                raw: None,
            })
        }
    }

    fn scripted(answer: &'static str) -> Arc<Scripted> {
        Arc::new(Scripted {
            answer,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("agent-run").chain(args.iter().copied())).unwrap()
    }

    fn settings(pairs: &[(&str, &str)]) -> RunSettings {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        RunSettings::from_lookup(move |key| map.get(key).cloned())
    }

    fn never() -> agent_core::Result<Arc<dyn LlmProvider>> {
        panic!("provider must not be requested")
    }

    fn no_key() -> agent_core::Result<Arc<dyn LlmProvider>> {
        Err(AgentError::Auth("OPENAI_API_KEY is not set".into()))
    }

    #[tokio::test]
    async fn test_missing_instruction() {
        let err = run(&cli(&[]), &settings(&[]), never).await.unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_json()["system"], "Error: missing argument (instruction)");
    }

    #[tokio::test]
    async fn test_echo_run() {
        let report = run(&cli(&["--agent", "echo", "hola"]), &settings(&[("OPENAI_MODEL", "x")]), never)
            .await
            .unwrap();
        assert_eq!(report.output, "Echo: hola");
        assert_eq!(report.agent, "EchoAgent");
        assert!(report.calls.is_empty());
        assert!(report.params.is_none());
    }

    #[tokio::test]
    async fn test_echo_rejects_config() {
        let err = run(&cli(&["--agent", "echo", "--config", r#"{"model": "x"}"#, "hola"]), &settings(&[]), never)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert_eq!(err.to_json()["errors"][0]["code"], "config.not_supported");
    }

    #[tokio::test]
    async fn test_invalid_env_setting_is_config_error() {
        let err = run(&cli(&["hola"]), &settings(&[("OPENAI_TEMPERATURE", "3")]), never)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 5);
        let body = err.to_json();
        assert_eq!(body["system"], "Invalid config");
        assert_eq!(body["errors"][0]["code"], "config.validation");
        assert_eq!(body["errors"][0]["source"]["pointer"], "/temperature");
    }

    #[tokio::test]
    async fn test_malformed_config_json() {
        let err = run(&cli(&["--config", "{not json", "hola"]), &settings(&[]), never)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert_eq!(err.to_json()["errors"][0]["code"], "config.error");

        let err = run(&cli(&["--config", "[1]", "hola"]), &settings(&[]), never)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }

    #[tokio::test]
    async fn test_config_checked_before_credential() {
        let err = run(&cli(&["--config", r#"{"max_tokens": 0}"#, "hola"]), &settings(&[]), no_key)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 5);

        let err = run(&cli(&["hola"]), &settings(&[]), no_key).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_docs_is_deps_error() {
        let err = run(&cli(&["--docs", "/nonexistent/agent-run-docs.txt", "hola"]), &settings(&[]), never)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 6);
        assert_eq!(err.to_json()["system"], "Invalid dependencies");
        assert_eq!(err.to_json()["errors"][0]["code"], "deps.error");
    }

    #[tokio::test]
    async fn test_tooled_run_report() {
        let provider = scripted("Rosalía es una cantante española.");
        let connect = {
            let provider = provider.clone();
            move || Ok(provider as Arc<dyn LlmProvider>)
        };

        let report = run(
            &cli(&["--config", r#"{"max_tokens": 128}"#, "¿Quién es Rosalía?"]),
            &settings(&[("OPENAI_MODEL", "gpt-4o"), ("OPENAI_TEMPERATURE", "0.2")]),
            connect,
        )
        .await
        .unwrap();

        assert_eq!(report.output, "Rosalía es una cantante española.");
        assert_eq!(report.model_requested.as_deref(), Some("gpt-4o"));
        assert_eq!(
            report.params,
            Some(ReportParams {
                temperature: 0.2,
                max_tokens: 128
            })
        );

        assert_eq!(report.calls.len(), 1);
        let call = &report.calls[0];
        assert_eq!(call.parent_run_id, Some(report.run_id));
        assert_eq!(call.model.as_deref(), Some("gpt-4o-mini-2024-07-18"));
        assert_eq!(call.total_tokens, 15);
        assert_eq!(report.totals.total_tokens, 15);
        assert_eq!(report.totals.cost_usd, call.cost_usd);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].model, "gpt-4o");
        assert_eq!(seen[0].max_tokens, 128);
    }

    #[tokio::test]
    async fn test_execution_failure() {
        let provider = scripted("");
        let err = run(&cli(&["hola"]), &settings(&[]), move || Ok(provider as Arc<dyn LlmProvider>))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_json()["system"].as_str().unwrap().starts_with("Error running agent"));
    }
}
