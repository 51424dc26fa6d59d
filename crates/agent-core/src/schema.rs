//! Schema Descriptions
//!
//! Declarative, immutable descriptions of the fields an agent accepts in its
//! configuration or dependency block. A schema is a plain value: field name,
//! semantic type, constraints and default. One generic validator
//! (`crate::validation`) walks it; nothing here uses reflection.

use std::any::TypeId;

use regex::Regex;
use serde_json::{Map, Value, json};

use crate::context::{Capability, Utility};
use crate::error::{AgentError, Result};

/// Semantic type of a schema field
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    /// Accepts any value, including live utility instances
    Any,
    /// A live instance of one concrete Rust type
    Instance {
        type_id: TypeId,
        type_name: &'static str,
    },
    /// A live instance exposing a capability interface
    Capability(Capability),
}

impl FieldType {
    /// Field holding an instance of `T`
    pub fn instance_of<T: 'static>() -> Self {
        FieldType::Instance {
            type_id: TypeId::of::<T>(),
            type_name: short_type_name(std::any::type_name::<T>()),
        }
    }

    /// Whether values of this type are live utility instances
    pub fn is_live(&self) -> bool {
        matches!(self, FieldType::Instance { .. } | FieldType::Capability(_))
    }

    /// Human-readable name used in messages and exported schemas
    pub fn display_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Any => "any",
            FieldType::Instance { type_name, .. } => type_name,
            FieldType::Capability(capability) => capability.name(),
        }
    }

    fn type_error(&self) -> ViolationKind {
        match self {
            FieldType::String => ViolationKind::StringType,
            FieldType::Integer => ViolationKind::IntType,
            FieldType::Number => ViolationKind::FloatType,
            FieldType::Boolean => ViolationKind::BoolType,
            FieldType::Object => ViolationKind::DictType,
            FieldType::Array => ViolationKind::ListType,
            FieldType::Any | FieldType::Instance { .. } | FieldType::Capability(_) => {
                ViolationKind::IsInstanceOf
            }
        }
    }

    fn accepts_data(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64() || whole_float(value).is_some(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
            FieldType::Any => true,
            FieldType::Instance { .. } | FieldType::Capability(_) => false,
        }
    }
}

/// A float with no fractional part that fits in `i64`
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn whole_float(value: &Value) -> Option<i64> {
    let n = value.as_f64().filter(|_| value.is_f64())?;
    (n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64).then(|| n as i64)
}

/// `my_crate::module::Type` -> `Type`
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Constraint attached to a field
#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    /// value >= bound
    Ge(f64),
    /// value <= bound
    Le(f64),
    /// value > bound
    Gt(f64),
    /// value < bound
    Lt(f64),
    /// Minimum string (chars) or array length
    MinLength(usize),
    /// Maximum string (chars) or array length
    MaxLength(usize),
    /// Regular expression a string must match (searched, not anchored)
    Pattern(String),
    /// Enumerated set of allowed values
    OneOf(Vec<Value>),
}

/// Canonical kind of a constraint violation.
///
/// `Missing` is the one absence condition; every other kind is a
/// validation failure of a value that was present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    Missing,
    StringType,
    IntType,
    FloatType,
    BoolType,
    DictType,
    ListType,
    GreaterThanEqual,
    LessThanEqual,
    GreaterThan,
    LessThan,
    StringTooShort,
    StringTooLong,
    TooShort,
    TooLong,
    PatternMismatch,
    Enum,
    IsInstanceOf,
    ExtraForbidden,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Missing => "missing",
            ViolationKind::StringType => "string_type",
            ViolationKind::IntType => "int_type",
            ViolationKind::FloatType => "float_type",
            ViolationKind::BoolType => "bool_type",
            ViolationKind::DictType => "dict_type",
            ViolationKind::ListType => "list_type",
            ViolationKind::GreaterThanEqual => "greater_than_equal",
            ViolationKind::LessThanEqual => "less_than_equal",
            ViolationKind::GreaterThan => "greater_than",
            ViolationKind::LessThan => "less_than",
            ViolationKind::StringTooShort => "string_too_short",
            ViolationKind::StringTooLong => "string_too_long",
            ViolationKind::TooShort => "too_short",
            ViolationKind::TooLong => "too_long",
            ViolationKind::PatternMismatch => "string_pattern_mismatch",
            ViolationKind::Enum => "enum",
            ViolationKind::IsInstanceOf => "is_instance_of",
            ViolationKind::ExtraForbidden => "extra_forbidden",
        }
    }
}

/// One field-level constraint violation
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    /// Path to the offending field
    pub loc: Vec<String>,
    pub kind: ViolationKind,
    pub message: String,
    /// Constraint context, e.g. `{"ge": 0.0}`
    pub ctx: Option<Value>,
}

impl Violation {
    fn new(field: &str, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            loc: vec![field.to_string()],
            kind,
            message: message.into(),
            ctx: None,
        }
    }

    fn with_ctx(mut self, ctx: Value) -> Self {
        self.ctx = Some(ctx);
        self
    }

    pub(crate) fn missing(field: &str) -> Self {
        Self::new(field, ViolationKind::Missing, "Field required")
    }

    pub(crate) fn extra(field: &str) -> Self {
        Self::new(field, ViolationKind::ExtraForbidden, "Extra inputs are not permitted")
    }
}

/// A value supplied for a schema field
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Plain data
    Data(Value),
    /// Live utility instance
    Utility(Utility),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Data(Value::Null))
    }

    /// JSON rendering; instances render as `"<TypeName>"`
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Data(value) => value.clone(),
            FieldValue::Utility(utility) => Value::String(format!("<{}>", utility.type_name())),
        }
    }

    pub fn as_utility(&self) -> Option<&Utility> {
        match self {
            FieldValue::Utility(utility) => Some(utility),
            FieldValue::Data(_) => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Data(value)
    }
}

impl From<Utility> for FieldValue {
    fn from(utility: Utility) -> Self {
        FieldValue::Utility(utility)
    }
}

/// Definition of a single schema field
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    /// Accepts explicit `null` (the optional wrapper around `ty`)
    pub nullable: bool,
    /// Default used when the field is omitted; no default means required
    pub default: Option<Value>,
    pub constraints: Vec<Constraint>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            default: None,
            constraints: Vec::new(),
            title: None,
            description: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    /// Dependency slot for a concrete type
    pub fn instance<T: 'static>(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::instance_of::<T>())
    }

    /// Dependency slot for a capability
    pub fn capability(name: impl Into<String>, capability: Capability) -> Self {
        Self::new(name, FieldType::Capability(capability))
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Nullable with a `null` default
    pub fn optional(mut self) -> Self {
        self.nullable = true;
        self.default = Some(Value::Null);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn ge(self, bound: f64) -> Self {
        self.constraint(Constraint::Ge(bound))
    }

    pub fn le(self, bound: f64) -> Self {
        self.constraint(Constraint::Le(bound))
    }

    pub fn gt(self, bound: f64) -> Self {
        self.constraint(Constraint::Gt(bound))
    }

    pub fn lt(self, bound: f64) -> Self {
        self.constraint(Constraint::Lt(bound))
    }

    pub fn min_length(self, len: usize) -> Self {
        self.constraint(Constraint::MinLength(len))
    }

    pub fn max_length(self, len: usize) -> Self {
        self.constraint(Constraint::MaxLength(len))
    }

    pub fn pattern(self, pattern: impl Into<String>) -> Self {
        self.constraint(Constraint::Pattern(pattern.into()))
    }

    pub fn one_of<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.constraint(Constraint::OneOf(values.into_iter().map(Into::into).collect()))
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// Check a supplied value against type and constraints.
    ///
    /// Returns the first violation for the field, if any. Errors only when
    /// the schema itself is malformed (uncompilable pattern).
    pub fn check(&self, value: &FieldValue) -> Result<Option<Violation>> {
        let data = match value {
            FieldValue::Utility(utility) => {
                if matches!(self.ty, FieldType::Any) || utility.satisfies(&self.ty) {
                    return Ok(None);
                }
                return Ok(Some(self.type_violation()));
            }
            FieldValue::Data(data) => data,
        };

        if data.is_null() {
            return Ok(if self.nullable {
                None
            } else {
                Some(self.type_violation())
            });
        }

        if !self.ty.accepts_data(data) {
            return Ok(Some(self.type_violation()));
        }

        for constraint in &self.constraints {
            if let Some(violation) = self.check_constraint(constraint, data)? {
                return Ok(Some(violation));
            }
        }

        Ok(None)
    }

    /// Canonical form of an accepted value: `128.0` in an integer field is
    /// stored as `128` so typed parsing of the validated block succeeds
    pub(crate) fn normalize(&self, value: &FieldValue) -> FieldValue {
        match (&self.ty, value) {
            (FieldType::Integer, FieldValue::Data(data)) => {
                whole_float(data).map_or_else(|| value.clone(), |n| FieldValue::Data(Value::from(n)))
            }
            _ => value.clone(),
        }
    }

    fn type_violation(&self) -> Violation {
        let kind = self.ty.type_error();
        let message = match kind {
            ViolationKind::IsInstanceOf => {
                format!("Input should be an instance of {}", self.ty.display_name())
            }
            _ => format!("Input should be a valid {}", self.ty.display_name()),
        };
        let violation = Violation::new(&self.name, kind, message);
        if kind == ViolationKind::IsInstanceOf {
            violation.with_ctx(json!({ "class": self.ty.display_name() }))
        } else {
            violation
        }
    }

    fn check_constraint(&self, constraint: &Constraint, data: &Value) -> Result<Option<Violation>> {
        let name = self.name.as_str();
        let violation = match constraint {
            Constraint::Ge(bound) => data.as_f64().filter(|n| n < bound).map(|_| {
                Violation::new(name, ViolationKind::GreaterThanEqual, format!("Input should be greater than or equal to {bound}"))
                    .with_ctx(json!({ "ge": bound }))
            }),
            Constraint::Le(bound) => data.as_f64().filter(|n| n > bound).map(|_| {
                Violation::new(name, ViolationKind::LessThanEqual, format!("Input should be less than or equal to {bound}"))
                    .with_ctx(json!({ "le": bound }))
            }),
            Constraint::Gt(bound) => data.as_f64().filter(|n| n <= bound).map(|_| {
                Violation::new(name, ViolationKind::GreaterThan, format!("Input should be greater than {bound}"))
                    .with_ctx(json!({ "gt": bound }))
            }),
            Constraint::Lt(bound) => data.as_f64().filter(|n| n >= bound).map(|_| {
                Violation::new(name, ViolationKind::LessThan, format!("Input should be less than {bound}"))
                    .with_ctx(json!({ "lt": bound }))
            }),
            Constraint::MinLength(min) => match length_of(data) {
                Some((len, is_str)) if len < *min => {
                    let kind = if is_str { ViolationKind::StringTooShort } else { ViolationKind::TooShort };
                    Some(
                        Violation::new(name, kind, format!("Value should have at least {min} item(s)"))
                            .with_ctx(json!({ "min_length": min })),
                    )
                }
                _ => None,
            },
            Constraint::MaxLength(max) => match length_of(data) {
                Some((len, is_str)) if len > *max => {
                    let kind = if is_str { ViolationKind::StringTooLong } else { ViolationKind::TooLong };
                    Some(
                        Violation::new(name, kind, format!("Value should have at most {max} item(s)"))
                            .with_ctx(json!({ "max_length": max })),
                    )
                }
                _ => None,
            },
            Constraint::Pattern(pattern) => {
                let regex = Regex::new(pattern).map_err(|e| {
                    AgentError::Schema(format!("field '{name}' has invalid pattern '{pattern}': {e}"))
                })?;
                data.as_str().filter(|s| !regex.is_match(s)).map(|_| {
                    Violation::new(name, ViolationKind::PatternMismatch, format!("String should match pattern '{pattern}'"))
                        .with_ctx(json!({ "pattern": pattern }))
                })
            }
            Constraint::OneOf(allowed) => {
                if allowed.contains(data) {
                    None
                } else {
                    let expected = allowed
                        .iter()
                        .map(|v| v.to_string().replace('"', "'"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    Some(
                        Violation::new(name, ViolationKind::Enum, format!("Input should be one of {expected}"))
                            .with_ctx(json!({ "expected": expected })),
                    )
                }
            }
        };
        Ok(violation)
    }

    fn to_json_schema(&self) -> Value {
        let mut prop = Map::new();
        let base = match &self.ty {
            FieldType::Any => json!({}),
            FieldType::Instance { type_name, .. } => json!({ "type": "object", "title": type_name }),
            FieldType::Capability(capability) => json!({
                "type": "object",
                "title": capability.name(),
                "description": capability.description(),
            }),
            other => json!({ "type": other.display_name() }),
        };

        if self.nullable {
            prop.insert("anyOf".into(), json!([base, { "type": "null" }]));
        } else if let Value::Object(base) = base {
            prop.extend(base);
        }

        let title = self.title.clone().unwrap_or_else(|| title_case(&self.name));
        prop.insert("title".into(), Value::String(title));
        if let Some(description) = &self.description {
            prop.insert("description".into(), Value::String(description.clone()));
        }
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }

        for constraint in &self.constraints {
            let (key, value) = match constraint {
                Constraint::Ge(b) => ("minimum", json!(b)),
                Constraint::Le(b) => ("maximum", json!(b)),
                Constraint::Gt(b) => ("exclusiveMinimum", json!(b)),
                Constraint::Lt(b) => ("exclusiveMaximum", json!(b)),
                Constraint::MinLength(n) if self.ty == FieldType::Array => ("minItems", json!(n)),
                Constraint::MaxLength(n) if self.ty == FieldType::Array => ("maxItems", json!(n)),
                Constraint::MinLength(n) => ("minLength", json!(n)),
                Constraint::MaxLength(n) => ("maxLength", json!(n)),
                Constraint::Pattern(p) => ("pattern", json!(p)),
                Constraint::OneOf(values) => ("enum", Value::Array(values.clone())),
            };
            prop.insert(key.into(), value);
        }

        Value::Object(prop)
    }
}

fn length_of(data: &Value) -> Option<(usize, bool)> {
    match data {
        Value::String(s) => Some((s.chars().count(), true)),
        Value::Array(items) => Some((items.len(), false)),
        _ => None,
    }
}

/// `max_tokens` -> `Max Tokens`
fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Named, immutable set of fields
#[derive(Clone, Debug)]
pub struct Schema {
    name: String,
    title: Option<String>,
    description: Option<String>,
    fields: Vec<FieldSpec>,
    deny_unknown: bool,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            fields: Vec::new(),
            deny_unknown: false,
        }
    }

    /// Add a field. A later field with the same name replaces the earlier one.
    pub fn field(mut self, field: FieldSpec) -> Self {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == field.name) {
            *existing = field;
        } else {
            self.fields.push(field);
        }
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Reject payload keys that are not declared fields
    pub fn deny_unknown_fields(mut self) -> Self {
        self.deny_unknown = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn denies_unknown_fields(&self) -> bool {
        self.deny_unknown
    }

    /// Render as JSON Schema (draft 2020-12 subset)
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.to_json_schema()))
            .collect();
        let required: Vec<Value> = self
            .fields
            .iter()
            .filter(|f| f.is_required())
            .map(|f| Value::String(f.name.clone()))
            .collect();

        let mut schema = Map::new();
        schema.insert(
            "title".into(),
            Value::String(self.title.clone().unwrap_or_else(|| self.name.clone())),
        );
        if let Some(description) = &self.description {
            schema.insert("description".into(), Value::String(description.clone()));
        }
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), Value::Array(required));
        }
        if self.deny_unknown {
            schema.insert("additionalProperties".into(), json!(false));
        }
        Value::Object(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(field: &FieldSpec, value: Value) -> Option<Violation> {
        field.check(&FieldValue::Data(value)).unwrap()
    }

    #[test]
    fn test_range_constraints() {
        let field = FieldSpec::number("temperature").ge(0.0).le(2.0);

        assert!(check(&field, json!(1.5)).is_none());
        assert!(check(&field, json!(0)).is_none());

        let v = check(&field, json!(5.0)).unwrap();
        assert_eq!(v.kind, ViolationKind::LessThanEqual);
        assert_eq!(v.ctx, Some(json!({ "le": 2.0 })));

        let v = check(&field, json!(-0.1)).unwrap();
        assert_eq!(v.kind, ViolationKind::GreaterThanEqual);
    }

    #[test]
    fn test_type_mismatch_reported_before_constraints() {
        let field = FieldSpec::number("temperature").ge(0.0);
        let v = check(&field, json!("hot")).unwrap();
        assert_eq!(v.kind, ViolationKind::FloatType);
        assert_eq!(v.loc, vec!["temperature".to_string()]);
    }

    #[test]
    fn test_integer_accepts_whole_floats_only() {
        let field = FieldSpec::integer("max_tokens");
        assert!(check(&field, json!(256)).is_none());
        assert!(check(&field, json!(256.0)).is_none());
        assert_eq!(check(&field, json!(2.5)).unwrap().kind, ViolationKind::IntType);
    }

    #[test]
    fn test_pattern_and_enum() {
        let lang = FieldSpec::string("lang").pattern("^[a-z]{2}$");
        assert!(check(&lang, json!("es")).is_none());
        assert_eq!(check(&lang, json!("spanish")).unwrap().kind, ViolationKind::PatternMismatch);

        let mode = FieldSpec::string("mode").one_of(["fast", "slow"]);
        assert!(check(&mode, json!("fast")).is_none());
        assert_eq!(check(&mode, json!("medium")).unwrap().kind, ViolationKind::Enum);
    }

    #[test]
    fn test_invalid_pattern_is_schema_error() {
        let field = FieldSpec::string("bad").pattern("([");
        let err = field.check(&FieldValue::Data(json!("x"))).unwrap_err();
        assert!(matches!(err, AgentError::Schema(_)));
    }

    #[test]
    fn test_null_requires_nullable() {
        let strict = FieldSpec::string("name");
        assert_eq!(check(&strict, Value::Null).unwrap().kind, ViolationKind::StringType);

        let loose = FieldSpec::string("name").nullable();
        assert!(check(&loose, Value::Null).is_none());
    }

    #[test]
    fn test_json_schema_export() {
        let schema = Schema::new("SampleConfig")
            .field(FieldSpec::string("model").default("gpt-4o-mini"))
            .field(FieldSpec::number("temperature").ge(0.0).le(2.0).default(0.0))
            .field(FieldSpec::string("api_base"));

        let exported = schema.to_json_schema();
        assert_eq!(exported["title"], "SampleConfig");
        assert_eq!(exported["properties"]["temperature"]["maximum"], 2.0);
        assert_eq!(exported["properties"]["temperature"]["title"], "Temperature");
        assert_eq!(exported["properties"]["api_base"]["title"], "Api Base");
        assert_eq!(exported["required"], json!(["api_base"]));
    }

    #[test]
    fn test_duplicate_field_replaces() {
        let schema = Schema::new("S")
            .field(FieldSpec::string("a"))
            .field(FieldSpec::integer("a").default(1));
        assert_eq!(schema.fields().len(), 1);
        assert_eq!(schema.get("a").unwrap().ty, FieldType::Integer);
    }
}
