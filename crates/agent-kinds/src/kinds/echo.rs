//! Echo Agent
//!
//! Takes no configuration and no dependencies. Useful to check wiring.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{Agent, Result, Tool, Validated};

#[derive(Clone, Copy, Debug, Default)]
pub struct EchoAgent;

#[async_trait]
impl Agent for EchoAgent {
    async fn execute(
        &self,
        instruction: &str,
        _cfg: Option<&Validated>,
        _deps: Option<&Validated>,
        _tools: &[Arc<dyn Tool>],
    ) -> Result<String> {
        Ok(format!("Echo: {instruction}"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use agent_core::{AgentError, resolve};

    #[tokio::test]
    async fn test_echo() {
        let out = resolve(EchoAgent, "hola", Value::Null, Value::Null).await.unwrap();
        assert_eq!(out, "Echo: hola");
    }

    #[tokio::test]
    async fn test_echo_rejects_config() {
        let err = resolve(EchoAgent, "hola", json!({"model": "x"}), Value::Null)
            .await
            .unwrap_err();
        let AgentError::Validation(failure) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(failure.errors[0].code, "config.not_supported");
    }
}
