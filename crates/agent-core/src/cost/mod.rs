//! Cost Tracing
//!
//! `CostTracer` listens to LLM invocation events and keeps one record per
//! completed invocation: timing, token usage, cost and short previews.
//!
//! Starts are held in an in-flight map keyed by run id. An end or error
//! event pops its entry and appends a finished record, so each run id
//! completes at most once and events for unknown run ids are ignored.
//! Starts that never end are never reported.

pub mod extract;
pub mod pricing;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{Message, estimate_tokens};
use crate::provider::{InvocationObserver, LlmResponse, RunId, TokenUsage};

pub use pricing::{ModelPrice, estimate_cost_usd, price_for};

/// Characters kept in prompt/output previews
pub const PREVIEW_CHARS: usize = 200;

/// Model name recorded when the provider does not report one
pub const UNKNOWN_MODEL: &str = "unknown";

/// How the invocation was started
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationKind {
    /// Plain text prompts
    Llm,
    /// Chat conversations
    Chat,
}

/// One finished LLM invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub run_id: RunId,

    pub parent_run_id: Option<RunId>,

    pub kind: InvocationKind,

    /// Provider or model-wrapper name given at start
    pub name: String,

    /// Model reported by the provider, `"unknown"` if none; absent on error
    pub model: Option<String>,

    pub start_time: DateTime<Utc>,

    pub end_time: DateTime<Utc>,

    pub latency_ms: u64,

    pub prompt_tokens: u32,

    pub completion_tokens: u32,

    pub total_tokens: u32,

    #[serde(with = "rust_decimal::serde::float")]
    pub cost_usd: Decimal,

    pub request_id: Option<String>,

    pub prompt_preview: String,

    pub output_preview: Option<String>,

    /// Provider metadata kept for auditing
    #[serde(default)]
    pub raw: Value,

    /// Error message for failed invocations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Sums over finished invocations
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CostTotals {
    pub calls: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost_usd: Decimal,
}

#[derive(Debug)]
struct InFlight {
    kind: InvocationKind,
    parent_run_id: Option<RunId>,
    name: String,
    start_time: DateTime<Utc>,
    prompts: Vec<String>,
}

#[derive(Debug, Default)]
struct TracerState {
    in_flight: HashMap<RunId, InFlight>,
    finished: Vec<InvocationRecord>,
}

/// Event sink accumulating per-invocation cost records
#[derive(Debug, Default)]
pub struct CostTracer {
    state: Mutex<TracerState>,
}

impl CostTracer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TracerState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn start(&self, kind: InvocationKind, run_id: RunId, parent_run_id: Option<RunId>, name: &str, prompts: Vec<String>) {
        tracing::debug!(%run_id, ?kind, prompts = prompts.len(), "invocation started");
        let entry = InFlight {
            kind,
            parent_run_id,
            name: if name.is_empty() { UNKNOWN_MODEL.into() } else { name.to_string() },
            start_time: Utc::now(),
            prompts,
        };
        // A repeated start for the same run id replaces the earlier one.
        self.lock().in_flight.insert(run_id, entry);
    }

    /// Record the end of an invocation given only a loosely structured
    /// response payload
    pub fn on_llm_end_loose(&self, run_id: RunId, payload: &Value) {
        self.on_llm_end(run_id, &extract::from_loose(payload));
    }

    /// Finished records in completion order
    pub fn finished(&self) -> Vec<InvocationRecord> {
        self.lock().finished.clone()
    }

    /// Number of started but not yet finished invocations
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    pub fn totals(&self) -> CostTotals {
        let state = self.lock();
        let mut totals = state.finished.iter().fold(CostTotals::default(), |mut acc, r| {
            acc.calls += 1;
            acc.prompt_tokens += u64::from(r.prompt_tokens);
            acc.completion_tokens += u64::from(r.completion_tokens);
            acc.total_tokens += u64::from(r.total_tokens);
            acc.cost_usd += r.cost_usd;
            acc
        });
        totals.cost_usd = totals.cost_usd.round_dp(pricing::COST_SCALE);
        totals
    }
}

impl InvocationObserver for CostTracer {
    fn on_llm_start(&self, run_id: RunId, parent_run_id: Option<RunId>, name: &str, prompts: &[String]) {
        self.start(InvocationKind::Llm, run_id, parent_run_id, name, prompts.to_vec());
    }

    fn on_chat_model_start(
        &self,
        run_id: RunId,
        parent_run_id: Option<RunId>,
        name: &str,
        conversations: &[Vec<Message>],
    ) {
        let prompts = conversations
            .iter()
            .map(|conversation| {
                conversation
                    .iter()
                    .map(|m| m.content.as_str())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|text| !text.is_empty())
            .collect();
        self.start(InvocationKind::Chat, run_id, parent_run_id, name, prompts);
    }

    fn on_llm_end(&self, run_id: RunId, response: &LlmResponse) {
        let end_time = Utc::now();
        let mut state = self.lock();
        let Some(call) = state.in_flight.remove(&run_id) else {
            tracing::debug!(%run_id, "end for unknown run, ignoring");
            return;
        };

        let usage = match response.usage {
            Some(usage) if !usage.is_zero() => usage,
            _ => TokenUsage::new(
                estimate_tokens(&call.prompts.join(" ")),
                estimate_tokens(&response.output_text),
            ),
        };
        let model = response.model.clone().unwrap_or_else(|| UNKNOWN_MODEL.into());
        let cost_usd = estimate_cost_usd(&model, &usage);

        tracing::debug!(%run_id, model = %model, tokens = usage.total_tokens, cost = %cost_usd, "invocation finished");

        state.finished.push(InvocationRecord {
            run_id,
            parent_run_id: call.parent_run_id,
            kind: call.kind,
            name: call.name,
            model: Some(model),
            start_time: call.start_time,
            end_time,
            latency_ms: latency_ms(call.start_time, end_time),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            cost_usd,
            request_id: response.request_id.clone(),
            prompt_preview: preview(call.prompts.first().map_or("", String::as_str)),
            output_preview: Some(preview(&response.output_text)),
            raw: response.raw.clone(),
            error: None,
        });
    }

    fn on_llm_error(&self, run_id: RunId, error: &str) {
        let end_time = Utc::now();
        let mut state = self.lock();
        let Some(call) = state.in_flight.remove(&run_id) else {
            tracing::debug!(%run_id, "error for unknown run, ignoring");
            return;
        };

        tracing::error!(%run_id, error, "invocation failed");

        state.finished.push(InvocationRecord {
            run_id,
            parent_run_id: call.parent_run_id,
            kind: call.kind,
            name: call.name,
            model: None,
            start_time: call.start_time,
            end_time,
            latency_ms: latency_ms(call.start_time, end_time),
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            cost_usd: Decimal::ZERO,
            request_id: None,
            prompt_preview: preview(call.prompts.first().map_or("", String::as_str)),
            output_preview: None,
            raw: Value::Null,
            error: Some(error.to_string()),
        });
    }
}

fn latency_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}

/// First [`PREVIEW_CHARS`] characters, with an ellipsis only when cut
fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    fn response(model: &str, usage: Option<TokenUsage>, text: &str) -> LlmResponse {
        LlmResponse {
            model: Some(model.into()),
            usage,
            output_text: text.into(),
            ..LlmResponse::default()
        }
    }

    #[test]
    fn test_reported_usage_and_cost() {
        let tracer = CostTracer::new();
        let r1 = RunId::new();

        tracer.on_llm_start(r1, None, "openai", &["hi".into()]);
        tracer.on_llm_end(r1, &response("gpt-4o-mini", Some(TokenUsage::new(10, 5)), "hello"));

        let finished = tracer.finished();
        assert_eq!(finished.len(), 1);
        let record = &finished[0];
        assert_eq!(record.total_tokens, 15);
        assert_eq!(record.cost_usd, dec!(0.0045));
        assert_eq!(record.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(record.kind, InvocationKind::Llm);
        assert!(record.end_time >= record.start_time);
        assert_eq!(tracer.in_flight(), 0);
    }

    #[test]
    fn test_end_for_unknown_run_is_noop() {
        let tracer = CostTracer::new();
        tracer.on_llm_end(RunId::new(), &response("gpt-4o", Some(TokenUsage::new(1, 1)), ""));
        tracer.on_llm_error(RunId::new(), "boom");
        assert!(tracer.finished().is_empty());
        assert_eq!(tracer.totals(), CostTotals::default());
    }

    #[test]
    fn test_each_run_completes_once() {
        let tracer = CostTracer::new();
        let run = RunId::new();
        tracer.on_llm_start(run, None, "openai", &["p".into()]);
        tracer.on_llm_end(run, &response("gpt-4o", None, "x"));
        tracer.on_llm_end(run, &response("gpt-4o", None, "x"));
        assert_eq!(tracer.finished().len(), 1);
    }

    #[test]
    fn test_dangling_start_not_reported() {
        let tracer = CostTracer::new();
        tracer.on_llm_start(RunId::new(), None, "openai", &["p".into()]);
        assert_eq!(tracer.in_flight(), 1);
        assert!(tracer.finished().is_empty());
        assert_eq!(tracer.totals().calls, 0);
    }

    #[test]
    fn test_missing_usage_is_estimated() {
        let tracer = CostTracer::new();
        let run = RunId::new();
        let conversation = vec![Message::system("abcd"), Message::user("efgh")];
        tracer.on_chat_model_start(run, None, "openai", &[conversation]);

        let mut resp = response("gpt-4o-mini", Some(TokenUsage::default()), "12345678");
        resp.model = None;
        tracer.on_llm_end(run, &resp);

        let record = &tracer.finished()[0];
        assert_eq!(record.kind, InvocationKind::Chat);
        assert_eq!(record.prompt_preview, "abcd efgh");
        // "abcd efgh" is 9 chars
        assert_eq!(record.prompt_tokens, 3);
        assert_eq!(record.completion_tokens, 2);
        assert_eq!(record.total_tokens, 5);
        assert_eq!(record.model.as_deref(), Some(UNKNOWN_MODEL));
        assert_eq!(record.cost_usd, Decimal::ZERO);
    }

    #[test]
    fn test_total_only_usage_is_estimated() {
        let tracer = CostTracer::new();
        let run = RunId::new();
        tracer.on_llm_start(run, None, "openai", &["abcdefgh".into()]);

        let usage = TokenUsage {
            total_tokens: 99,
            ..TokenUsage::default()
        };
        tracer.on_llm_end(run, &response("gpt-4o-mini", Some(usage), "abcd"));

        let record = &tracer.finished()[0];
        assert_eq!(record.prompt_tokens, 2);
        assert_eq!(record.completion_tokens, 1);
        assert_eq!(record.total_tokens, 3);
        assert!(record.cost_usd > Decimal::ZERO);
    }

    #[test]
    fn test_repeated_start_replaces_in_flight_call() {
        let tracer = CostTracer::new();
        let r1 = RunId::new();
        tracer.on_llm_start(r1, None, "openai", &["first prompt".into()]);
        tracer.on_llm_start(r1, None, "openai", &["second prompt".into()]);
        assert_eq!(tracer.in_flight(), 1);

        tracer.on_llm_end(r1, &response("gpt-4o-mini", Some(TokenUsage::new(10, 5)), "done"));
        tracer.on_llm_end(r1, &response("gpt-4o-mini", Some(TokenUsage::new(10, 5)), "done"));

        let finished = tracer.finished();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].prompt_preview, "second prompt");
        assert_eq!(tracer.in_flight(), 0);
    }

    #[test]
    fn test_error_records_zero_usage() {
        let tracer = CostTracer::new();
        let parent = RunId::new();
        let run = RunId::new();
        tracer.on_llm_start(run, Some(parent), "openai", &["p".into()]);
        tracer.on_llm_error(run, "rate limited");

        let record = &tracer.finished()[0];
        assert_eq!(record.error.as_deref(), Some("rate limited"));
        assert_eq!(record.parent_run_id, Some(parent));
        assert_eq!(record.total_tokens, 0);
        assert_eq!(record.cost_usd, Decimal::ZERO);
        assert!(record.output_preview.is_none());
    }

    #[test]
    fn test_totals_sum_finished_only() {
        let tracer = CostTracer::new();
        let (a, b, dangling) = (RunId::new(), RunId::new(), RunId::new());
        tracer.on_llm_start(a, None, "x", &["p".into()]);
        tracer.on_llm_start(b, None, "x", &["p".into()]);
        tracer.on_llm_start(dangling, None, "x", &["p".into()]);
        tracer.on_llm_end(a, &response("gpt-4o-mini", Some(TokenUsage::new(10, 5)), ""));
        tracer.on_llm_end(b, &response("gpt-4o-mini", Some(TokenUsage::new(1000, 0)), ""));

        let totals = tracer.totals();
        assert_eq!(totals.calls, 2);
        assert_eq!(totals.prompt_tokens, 1010);
        assert_eq!(totals.total_tokens, 1015);
        assert_eq!(totals.cost_usd, dec!(0.1545));
    }

    #[test]
    fn test_loose_payload_end() {
        let tracer = CostTracer::new();
        let run = RunId::new();
        tracer.on_llm_start(run, None, "x", &["p".into()]);
        tracer.on_llm_end_loose(
            run,
            &json!({"llm_output": {"token_usage": {"prompt_tokens": 10, "completion_tokens": 5}, "model_name": "gpt-4o-mini"}}),
        );
        assert_eq!(tracer.totals().cost_usd, dec!(0.0045));
    }

    #[test]
    fn test_preview_ellipsis_only_when_truncated() {
        assert_eq!(preview("short"), "short");
        let exact = "a".repeat(PREVIEW_CHARS);
        assert_eq!(preview(&exact), exact);
        let long = "ñ".repeat(PREVIEW_CHARS + 1);
        let cut = preview(&long);
        assert!(cut.ends_with('…'));
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 1);
    }

    #[test]
    fn test_record_serializes_cost_as_number() {
        let tracer = CostTracer::new();
        let run = RunId::new();
        tracer.on_llm_start(run, None, "x", &["p".into()]);
        tracer.on_llm_end(run, &response("gpt-4o-mini", Some(TokenUsage::new(10, 5)), ""));

        let json = serde_json::to_value(&tracer.finished()[0]).unwrap();
        assert!(json["cost_usd"].is_f64());
        assert_eq!(json["kind"], "llm");
        assert!(json.get("error").is_none());
    }
}
