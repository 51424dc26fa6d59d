//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "agent-run")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run an agent once and print a JSON cost report", long_about = None)]
pub struct Cli {
    /// Instruction handed to the agent
    pub instruction: Option<String>,

    /// Agent to run
    #[arg(short, long, value_enum, default_value_t = AgentKind::Tooled)]
    pub agent: AgentKind,

    /// Configuration object as JSON; keys override the OPENAI_* settings
    #[arg(short, long, value_name = "JSON")]
    pub config: Option<String>,

    /// Text file of RAG documents, one per blank-line separated paragraph
    #[arg(long, value_name = "FILE")]
    pub docs: Option<PathBuf>,

    /// Print the agent's configuration JSON Schema and exit
    #[arg(long)]
    pub schema: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AgentKind {
    /// Chat agent with RAG and Wikipedia
    Tooled,
    /// Returns the instruction unchanged
    Echo,
}
