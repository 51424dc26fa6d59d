//! agent-run
//!
//! Runs one agent on one instruction and prints a JSON report with the
//! answer and the token/cost breakdown of every model call.
//!
//! Logs go to stderr (`RUST_LOG`, default `warn`); stdout carries only the
//! report. Failures print a JSON object on stderr and exit non-zero.

mod cli;
mod error;
mod report;
mod runner;
mod settings;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, error::ErrorKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{LlmProvider, inspect};
use agent_kinds::{EchoAgent, TooledAgent};
use agent_runtime::OpenAiProvider;

use crate::cli::{AgentKind, Cli};
use crate::error::CliError;
use crate::settings::RunSettings;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => return Ok(fail(&CliError::Usage(e.to_string()))),
    };

    if cli.schema {
        let schema = match cli.agent {
            AgentKind::Tooled => inspect::<TooledAgent>(),
            AgentKind::Echo => inspect::<EchoAgent>(),
        };
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(ExitCode::SUCCESS);
    }

    let settings = RunSettings::from_env();
    let connect = || -> agent_core::Result<Arc<dyn LlmProvider>> { Ok(Arc::new(OpenAiProvider::from_env()?)) };

    match runner::run(&cli, &settings, connect).await {
        Ok(report) => {
            println!("{}", serde_json::to_string(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(fail(&e)),
    }
}

fn fail(err: &CliError) -> ExitCode {
    tracing::debug!(error = %err, code = err.exit_code(), "run failed");
    eprintln!("{}", err.to_json());
    ExitCode::from(err.exit_code())
}
