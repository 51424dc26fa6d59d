//! Configuration from the environment
//!
//! `OPENAI_MODEL`, `OPENAI_TEMPERATURE` and `OPENAI_MAX_TOKENS` seed the
//! agent configuration. Values that do not parse are passed through as
//! strings so the schema validator reports them like any other bad input.

use serde_json::{Map, Value};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSettings {
    values: Map<String, Value>,
}

impl RunSettings {
    /// Read the `OPENAI_*` generation settings
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut values = Map::new();

        if let Some(model) = lookup("OPENAI_MODEL").filter(|m| !m.trim().is_empty()) {
            values.insert("model".into(), Value::String(model));
        }
        if let Some(raw) = lookup("OPENAI_TEMPERATURE") {
            let value = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|t| t.is_finite())
                .map_or(Value::String(raw), Value::from);
            values.insert("temperature".into(), value);
        }
        if let Some(raw) = lookup("OPENAI_MAX_TOKENS") {
            let value = raw
                .trim()
                .parse::<i64>()
                .map_or(Value::String(raw), Value::from);
            values.insert("max_tokens".into(), value);
        }

        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Settings overlaid with an explicit configuration.
    ///
    /// Keys of an explicit object win. A non-object explicit value is
    /// returned unchanged so the validator can reject its shape.
    pub fn merge(&self, explicit: Option<Value>) -> Value {
        match explicit {
            None => Value::Object(self.values.clone()),
            Some(Value::Object(map)) => {
                let mut merged = self.values.clone();
                merged.extend(map);
                Value::Object(merged)
            }
            Some(other) => other,
        }
    }
}
