//! Loose response adapter
//!
//! Some callers only have a provider response as loosely structured JSON
//! (`llm_output`, `generations`, vendor metadata). `from_loose` turns that
//! into an explicit [`LlmResponse`]. Sources are tried in a fixed order and
//! the first non-empty usage block wins:
//!
//! 1. `llm_output.token_usage` / `llm_output.usage` (or top-level `usage`)
//! 2. `generations[0][0].message.response_metadata`
//! 3. `generations[0][0].generation_info`
//! 4. `llm_output.openai_api_response.usage`
//!
//! Extraction never fails. Whatever cannot be read stays `None` and the
//! tracer falls back to estimation.

use serde_json::{Map, Value, json};

use crate::provider::{LlmResponse, TokenUsage};

/// Build an [`LlmResponse`] from a loosely structured payload
pub fn from_loose(payload: &Value) -> LlmResponse {
    let empty = Map::new();
    let llm_output = payload
        .get("llm_output")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let first_generation = payload.pointer("/generations/0/0");
    let message = first_generation.and_then(|g| g.get("message"));
    let response_metadata = message
        .and_then(|m| m.get("response_metadata"))
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let generation_info = first_generation
        .and_then(|g| g.get("generation_info"))
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let openai_raw = llm_output
        .get("openai_api_response")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let usage = usage_block(llm_output)
        .or_else(|| payload.get("usage").and_then(parse_usage))
        .or_else(|| usage_block(response_metadata))
        .or_else(|| usage_block(generation_info))
        .or_else(|| openai_raw.get("usage").and_then(parse_usage));
    if usage.is_none() {
        tracing::debug!("no usage block in response payload");
    }

    let model = first_str(&[
        llm_output.get("model"),
        llm_output.get("model_name"),
        response_metadata.get("model"),
        response_metadata.get("model_name"),
        generation_info.get("model_name"),
        openai_raw.get("model"),
        payload.get("model"),
    ]);

    let request_id = first_str(&[
        response_metadata.get("id"),
        response_metadata.get("request_id"),
        openai_raw.get("id"),
        payload.get("id"),
    ]);

    let output_text = first_str(&[
        message.and_then(|m| m.get("content")),
        first_generation.and_then(|g| g.get("text")),
        payload.pointer("/choices/0/message/content"),
    ])
    .unwrap_or_default();

    LlmResponse {
        model,
        request_id,
        usage,
        output_text,
        raw: json!({
            "llm_output": llm_output,
            "response_message_metadata": response_metadata,
            "generation_info": generation_info,
        }),
    }
}

fn usage_block(source: &Map<String, Value>) -> Option<TokenUsage> {
    source
        .get("token_usage")
        .and_then(parse_usage)
        .or_else(|| source.get("usage").and_then(parse_usage))
}

/// Parse a usage object; empty blocks and blocks without a prompt or
/// completion count count as absent
fn parse_usage(value: &Value) -> Option<TokenUsage> {
    let block = value.as_object().filter(|m| !m.is_empty())?;
    let count = |keys: &[&str]| -> u32 {
        keys.iter()
            .find_map(|k| block.get(*k).and_then(Value::as_u64))
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };

    let prompt_tokens = count(&["prompt_tokens", "input_tokens"]);
    let completion_tokens = count(&["completion_tokens", "output_tokens"]);
    let total_tokens = match count(&["total_tokens"]) {
        0 => prompt_tokens.saturating_add(completion_tokens),
        n => n,
    };

    let usage = TokenUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens,
    };
    (!usage.is_zero()).then_some(usage)
}

fn first_str(candidates: &[Option<&Value>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .find_map(|v| v.as_str().filter(|s| !s.is_empty()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_from_llm_output() {
        let payload = json!({
            "llm_output": {
                "token_usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
                "model_name": "gpt-4o-mini-2024-07-18"
            },
            "generations": [[{"text": "", "message": {"content": "Hola"}}]]
        });

        let response = from_loose(&payload);
        assert_eq!(response.usage, Some(TokenUsage::new(10, 5)));
        assert_eq!(response.model.as_deref(), Some("gpt-4o-mini-2024-07-18"));
        assert_eq!(response.output_text, "Hola");
    }

    #[test]
    fn test_usage_from_response_metadata() {
        let payload = json!({
            "llm_output": {},
            "generations": [[{
                "message": {
                    "content": "x",
                    "response_metadata": {
                        "token_usage": {"prompt_tokens": 7, "completion_tokens": 3},
                        "model_name": "gpt-4.1",
                        "id": "chatcmpl-1"
                    }
                }
            }]]
        });

        let response = from_loose(&payload);
        assert_eq!(response.usage, Some(TokenUsage::new(7, 3)));
        assert_eq!(response.model.as_deref(), Some("gpt-4.1"));
        assert_eq!(response.request_id.as_deref(), Some("chatcmpl-1"));
    }

    #[test]
    fn test_usage_from_generation_info_then_openai_raw() {
        let from_info = json!({
            "generations": [[{"text": "t", "generation_info": {"usage": {"input_tokens": 4, "output_tokens": 2}}}]]
        });
        assert_eq!(from_loose(&from_info).usage, Some(TokenUsage::new(4, 2)));
        assert_eq!(from_loose(&from_info).output_text, "t");

        let from_raw = json!({
            "llm_output": {"openai_api_response": {"usage": {"prompt_tokens": 1, "completion_tokens": 1}, "id": "r"}}
        });
        let response = from_loose(&from_raw);
        assert_eq!(response.usage, Some(TokenUsage::new(1, 1)));
        assert_eq!(response.request_id.as_deref(), Some("r"));
    }

    #[test]
    fn test_zero_usage_counts_as_absent() {
        let payload = json!({
            "llm_output": {"token_usage": {"prompt_tokens": 0, "completion_tokens": 0}},
            "generations": [[{"generation_info": {"token_usage": {"prompt_tokens": 2, "completion_tokens": 2}}}]]
        });
        assert_eq!(from_loose(&payload).usage, Some(TokenUsage::new(2, 2)));
    }

    #[test]
    fn test_total_only_usage_counts_as_absent() {
        let payload = json!({"usage": {"total_tokens": 42}});
        assert!(from_loose(&payload).usage.is_none());
    }

    #[test]
    fn test_huge_counts_saturate() {
        let payload = json!({"usage": {"prompt_tokens": 4_000_000_000u64, "completion_tokens": 4_000_000_000u64}});
        let usage = from_loose(&payload).usage.unwrap();
        assert_eq!(usage.prompt_tokens, 4_000_000_000);
        assert_eq!(usage.total_tokens, u32::MAX);
    }

    #[test]
    fn test_unrecognized_payload_is_empty_response() {
        let response = from_loose(&json!("not an object"));
        assert!(response.usage.is_none());
        assert!(response.model.is_none());
        assert!(response.output_text.is_empty());
    }
}
