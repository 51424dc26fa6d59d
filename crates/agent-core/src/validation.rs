//! Configuration & Dependency Validation
//!
//! Validates raw payloads against a [`Schema`] and normalizes every failure
//! into the portable error-report format consumed by CLIs and services:
//!
//! ```text
//! { "ok": false,
//!   "errors": [ { "code": "config.validation",
//!                 "title": "Validation error",
//!                 "detail": "Input should be less than or equal to 2",
//!                 "source": { "pointer": "/temperature" },
//!                 "meta": { "type": "less_than_equal", "ctx": { "le": 2.0 } } } ] }
//! ```
//!
//! Downstream consumers branch on the `code` suffix, so the
//! `missing` / `validation` split follows [`ViolationKind::Missing`] exactly.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::context::{RagExpander, Utility};
use crate::error::{AgentError, Result};
use crate::schema::{FieldValue, Schema, Violation, ViolationKind};
use crate::tool::Tool;

/// Which block of an agent invocation is being validated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Config,
    Deps,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Config => "config",
            Section::Deps => "deps",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payloads & validated objects
// ============================================================================

/// Raw input handed to the validator
#[derive(Clone, Debug, Default)]
pub enum Payload {
    /// Nothing supplied
    #[default]
    Absent,
    /// Untyped JSON; objects are treated as maps, `null` as absent
    Json(Value),
    /// Field map that may carry live utility instances
    Fields(Vec<(String, FieldValue)>),
    /// Output of a previous validation
    Validated(Validated),
}

impl Payload {
    /// Empty field map, to be filled with [`Payload::with`]
    pub fn fields() -> Self {
        Payload::Fields(Vec::new())
    }

    /// Set a field. Non-map payloads are first turned into a field map.
    pub fn with(self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let mut fields = match self {
            Payload::Fields(fields) => fields,
            Payload::Json(Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| (k, FieldValue::Data(v)))
                .collect(),
            Payload::Validated(validated) => validated.fields,
            Payload::Absent | Payload::Json(_) => Vec::new(),
        };
        let name = name.into();
        fields.retain(|(k, _)| *k != name);
        fields.push((name, value.into()));
        Payload::Fields(fields)
    }

    /// `null`, `{}`, `[]` and an empty field map count as "nothing supplied"
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Absent => true,
            Payload::Json(Value::Null) => true,
            Payload::Json(Value::Object(map)) => map.is_empty(),
            Payload::Json(Value::Array(items)) => items.is_empty(),
            Payload::Json(_) => false,
            Payload::Fields(fields) => fields.is_empty(),
            Payload::Validated(_) => false,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Payload::Json(Value::Object(map))
    }
}

impl From<Validated> for Payload {
    fn from(validated: Validated) -> Self {
        Payload::Validated(validated)
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map_or(Payload::Absent, Into::into)
    }
}

/// An object known to satisfy its schema
#[derive(Clone, Debug, PartialEq)]
pub struct Validated {
    schema: String,
    fields: Vec<(String, FieldValue)>,
}

impl Validated {
    /// Name of the schema this object satisfies
    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Plain data value of a field
    pub fn data(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            FieldValue::Data(value) => Some(value),
            FieldValue::Utility(_) => None,
        }
    }

    /// Utility instance held by a field
    pub fn utility(&self, name: &str) -> Option<&Utility> {
        self.get(name)?.as_utility()
    }

    /// Concrete instance held by a field
    pub fn instance<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.utility(name)?.downcast::<T>()
    }

    /// Expander capability held by a field
    pub fn expander(&self, name: &str) -> Option<Arc<dyn RagExpander>> {
        self.utility(name)?.as_expander()
    }

    /// Every tool carried by a field, in schema order
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.fields
            .iter()
            .filter_map(|(_, v)| v.as_utility().and_then(Utility::as_tool))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serialized form (live instances render as `"<TypeName>"`)
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Deserialize the data fields into a typed config struct
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}

// ============================================================================
// Error report format
// ============================================================================

/// Location of the offending input
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSource {
    pub pointer: String,
}

/// Raw constraint-violation details
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorMeta {
    #[serde(rename = "type")]
    pub kind: String,
    pub ctx: Option<Value>,
}

/// One entry of a validation error report
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrorItem {
    /// `<section>.missing`, `<section>.validation`, `<section>.not_supported`
    /// or `<section>.error`
    pub code: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ErrorMeta>,
}

impl ValidationErrorItem {
    fn from_violation(section: Section, violation: &Violation) -> Self {
        let pointer = if violation.loc.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", violation.loc.join("/"))
        };
        let is_missing = violation.kind == ViolationKind::Missing;

        Self {
            code: format!("{section}.{}", if is_missing { "missing" } else { "validation" }),
            title: if is_missing { "Required field missing" } else { "Validation error" }.into(),
            detail: Some(violation.message.clone()),
            source: Some(ErrorSource { pointer }),
            meta: Some(ErrorMeta {
                kind: violation.kind.as_str().into(),
                ctx: violation.ctx.clone(),
            }),
        }
    }

    fn not_supported(section: Section, owner: &str) -> Self {
        Self {
            code: format!("{section}.not_supported"),
            title: format!("{section} not supported"),
            detail: Some(format!("{owner} does not accept {section}.")),
            source: Some(ErrorSource {
                pointer: format!("/{section}"),
            }),
            meta: None,
        }
    }

    fn undecomposed(section: Section) -> Self {
        Self {
            code: format!("{section}.error"),
            title: format!("{section} error"),
            detail: None,
            source: None,
            meta: None,
        }
    }

    /// `<section>.error` item for input rejected before schema checks run
    pub fn error(section: Section, detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::undecomposed(section)
        }
    }

    pub fn pointer(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.pointer.as_str())
    }

    pub fn is_missing(&self) -> bool {
        self.code.ends_with(".missing")
    }
}

/// Normalize schema violations into report items, preserving order
pub fn normalize_violations(section: Section, violations: &[Violation]) -> Vec<ValidationErrorItem> {
    violations
        .iter()
        .map(|v| ValidationErrorItem::from_violation(section, v))
        .collect()
}

/// Structured validation failure carried through `AgentError::Validation`
#[derive(Error, Clone, Debug, PartialEq)]
#[error("{section} validation failed with {} error(s)", .errors.len())]
pub struct ValidationFailure {
    pub section: Section,
    pub errors: Vec<ValidationErrorItem>,
}

impl ValidationFailure {
    pub fn new(section: Section, errors: Vec<ValidationErrorItem>) -> Self {
        Self { section, errors }
    }

    fn not_supported(section: Section, owner: &str) -> Self {
        Self::new(section, vec![ValidationErrorItem::not_supported(section, owner)])
    }

    /// `{ "ok": false, "errors": [...] }`
    pub fn to_json(&self) -> Value {
        serde_json::json!({ "ok": false, "errors": self.errors })
    }
}

/// Result of a non-throwing lookup
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationReport {
    pub ok: bool,
    pub section: Section,
    /// Serialized validated object, `None` on failure or when no schema
    pub value: Option<Value>,
    pub errors: Vec<ValidationErrorItem>,
    /// Optional schema descriptor
    pub schema: Option<Value>,
}

impl ValidationReport {
    pub fn success(section: Section, value: Option<Value>) -> Self {
        Self {
            ok: true,
            section,
            value,
            errors: Vec::new(),
            schema: None,
        }
    }

    pub fn from_failure(failure: ValidationFailure) -> Self {
        let errors = if failure.errors.is_empty() {
            vec![ValidationErrorItem::undecomposed(failure.section)]
        } else {
            failure.errors
        };
        Self {
            ok: false,
            section: failure.section,
            value: None,
            errors,
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

impl Serialize for ValidationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("ok", &self.ok)?;
        map.serialize_entry(self.section.as_str(), &self.value)?;
        map.serialize_entry("errors", &self.errors)?;
        map.serialize_entry("schema", &self.schema)?;
        map.end()
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Validate `payload` against `schema`.
///
/// `owner` names the agent in `not_supported` reports. Returns `Ok(None)` only
/// when no schema is declared and nothing was supplied. Payloads that are
/// neither validated, a map nor absent fail with [`AgentError::PayloadShape`].
pub fn validate(
    owner: &str,
    schema: Option<&Schema>,
    payload: impl Into<Payload>,
    section: Section,
) -> Result<Option<Validated>> {
    let payload = payload.into();

    let Some(schema) = schema else {
        if payload.is_empty() {
            return Ok(None);
        }
        tracing::debug!(%section, owner, "payload supplied to agent without schema");
        return Err(ValidationFailure::not_supported(section, owner).into());
    };

    let input = match payload {
        Payload::Validated(validated) if validated.schema == schema.name() => {
            return Ok(Some(validated));
        }
        Payload::Validated(validated) => {
            return Err(AgentError::PayloadShape {
                section,
                expected: schema.name().to_string(),
                got: format!("validated {}", validated.schema),
            });
        }
        Payload::Absent | Payload::Json(Value::Null) => Vec::new(),
        Payload::Json(Value::Object(map)) => map
            .into_iter()
            .map(|(k, v)| (k, FieldValue::Data(v)))
            .collect(),
        Payload::Json(other) => {
            return Err(AgentError::PayloadShape {
                section,
                expected: schema.name().to_string(),
                got: json_kind(&other).to_string(),
            });
        }
        Payload::Fields(fields) => fields,
    };

    construct(schema, input, section).map(Some)
}

/// Non-throwing wrapper around [`validate`].
///
/// Validation failures become `{ok: false, errors}`; a payload-shape error
/// still propagates since it signals caller misuse, not bad data.
pub fn lookup(
    owner: &str,
    schema: Option<&Schema>,
    payload: impl Into<Payload>,
    section: Section,
) -> Result<ValidationReport> {
    match validate(owner, schema, payload, section) {
        Ok(validated) => Ok(ValidationReport::success(
            section,
            validated.map(|v| v.to_json()),
        )),
        Err(AgentError::Validation(failure)) => Ok(ValidationReport::from_failure(failure)),
        Err(other) => Err(other),
    }
}

fn construct(schema: &Schema, input: Vec<(String, FieldValue)>, section: Section) -> Result<Validated> {
    let mut violations = Vec::new();
    let mut fields = Vec::with_capacity(schema.fields().len());

    for field in schema.fields() {
        // last occurrence wins, like a map insert
        let supplied = input.iter().rev().find(|(k, _)| *k == field.name);
        match (supplied, &field.default) {
            (Some((_, value)), _) => match field.check(value)? {
                Some(violation) => violations.push(violation),
                None => fields.push((field.name.clone(), field.normalize(value))),
            },
            (None, Some(default)) => {
                fields.push((field.name.clone(), FieldValue::Data(default.clone())));
            }
            (None, None) => violations.push(Violation::missing(&field.name)),
        }
    }

    if schema.denies_unknown_fields() {
        for (key, _) in &input {
            if schema.get(key).is_none() {
                violations.push(Violation::extra(key));
            }
        }
    }

    if !violations.is_empty() {
        tracing::debug!(
            %section,
            schema = schema.name(),
            errors = violations.len(),
            "payload rejected"
        );
        return Err(ValidationFailure::new(section, normalize_violations(section, &violations)).into());
    }

    Ok(Validated {
        schema: schema.name().to_string(),
        fields,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
