//! JSON run report

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use agent_core::{CostTotals, InvocationRecord, RunId};

/// Generation parameters requested for the run
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

/// One LLM invocation as it appears in the report
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CallReport {
    pub run_id: RunId,
    pub parent_run_id: Option<RunId>,
    pub model: Option<String>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost_usd: Decimal,
    pub latency_ms: u64,
    pub request_id: Option<String>,
    pub prompt_preview: String,
    pub output_preview: Option<String>,
    pub raw: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&InvocationRecord> for CallReport {
    fn from(record: &InvocationRecord) -> Self {
        Self {
            run_id: record.run_id,
            parent_run_id: record.parent_run_id,
            model: record.model.clone(),
            prompt_tokens: record.prompt_tokens,
            completion_tokens: record.completion_tokens,
            total_tokens: record.total_tokens,
            cost_usd: record.cost_usd,
            latency_ms: record.latency_ms,
            request_id: record.request_id.clone(),
            prompt_preview: record.prompt_preview.clone(),
            output_preview: record.output_preview.clone(),
            raw: record.raw.clone(),
            error: record.error.clone(),
        }
    }
}

/// Aggregates over every call plus the wall-clock time of the whole run
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost_usd: Decimal,
    pub latency_ms: u64,
}

impl ReportTotals {
    pub fn new(totals: &CostTotals, latency_ms: u64) -> Self {
        Self {
            prompt_tokens: totals.prompt_tokens,
            completion_tokens: totals.completion_tokens,
            total_tokens: totals.total_tokens,
            cost_usd: totals.cost_usd,
            latency_ms,
        }
    }
}

/// Printed to stdout on success
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunReport {
    /// Parent of every call in `calls`
    pub run_id: RunId,
    pub agent: String,
    pub input: String,
    pub output: String,
    pub model_requested: Option<String>,
    pub params: Option<ReportParams>,
    pub calls: Vec<CallReport>,
    pub totals: ReportTotals,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use agent_core::provider::{LlmResponse, TokenUsage};
    use agent_core::{CostTracer, InvocationObserver};

    /// A finished record produced through the tracer itself
    fn record(parent: RunId) -> InvocationRecord {
        let tracer = CostTracer::new();
        let run_id = RunId::new();
        tracer.on_chat_model_start(run_id, Some(parent), "openai", &[]);
        tracer.on_llm_end(
            run_id,
            &LlmResponse {
                model: Some("gpt-4o-mini".into()),
                request_id: Some("chatcmpl-1".into()),
                usage: Some(TokenUsage::new(10, 5)),
                output_text: "Hola".into(),
                raw: Value::Null,
            },
        );
        tracer.finished().remove(0)
    }

    #[test]
    fn test_report_shape() {
        let parent = RunId::new();
        let record = record(parent);
        let report = RunReport {
            run_id: parent,
            agent: "TooledAgent".into(),
            input: "Saluda".into(),
            output: "Hola".into(),
            model_requested: Some("gpt-4o-mini".into()),
            params: Some(ReportParams {
                temperature: 0.0,
                max_tokens: 256,
            }),
            calls: vec![CallReport::from(&record)],
            totals: ReportTotals {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
                cost_usd: dec!(0.0045),
                latency_ms: 12,
            },
        };

        let rendered = serde_json::to_value(&report).unwrap();
        assert_eq!(rendered["params"], json!({"temperature": 0.0, "max_tokens": 256}));
        assert_eq!(rendered["calls"][0]["parent_run_id"], json!(parent.to_string()));
        assert_eq!(rendered["calls"][0]["model"], "gpt-4o-mini");
        assert_eq!(rendered["calls"][0]["total_tokens"], 15);
        assert_eq!(rendered["calls"][0]["cost_usd"], 0.0045);
        assert!(rendered["calls"][0].get("error").is_none());
        assert_eq!(rendered["totals"]["cost_usd"], 0.0045);
        assert_eq!(rendered["totals"]["latency_ms"], 12);
    }
}
