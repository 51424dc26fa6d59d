//! Concrete Agents

mod echo;
mod tooled;

pub use echo::EchoAgent;
pub use tooled::{TooledAgent, TooledConfig};
