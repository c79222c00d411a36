//! Evaluation of generated plans over JSON values.
//!
//! Runs the same validation and conversion plans the emitted code is
//! rendered from, against `serde_json::Value` bodies. This makes the
//! behavior of generated code observable without compiling it: a request
//! body can be validated, decoded into its domain payload and a domain
//! result encoded into its response body.
//!
//! Absent values follow serde's reading of the generated types: a missing
//! key or `null` is `None` in optional slots, an empty collection in
//! collection slots and `null` in `any` slots.

use std::fmt;

use serde_json::{Map, Value};
use shapegen_runtime::{
    invalid_enum_value_error, invalid_length_error, invalid_range_error, missing_field_error,
    validate_format, validate_pattern, MultiError,
};
use thiserror::Error;

use crate::codegen::converters::{Build, Constructor, ConstructorKind, Conversion, Source, Transform};
use crate::codegen::registry::Direction;
use crate::codegen::shapes::{ShapeRef, Slot};
use crate::codegen::validators::{Absence, Check, Rule, RuleKind, Subject, Target, ValueCheck};
use crate::codegen::ServiceArtifacts;
use crate::ir::{Primitive, DEFAULT_VIEW};

/// Errors raised while evaluating conversion plans.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpError {
    #[error("method '{method}' has no {what}")]
    UnknownMethod { method: String, what: &'static str },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// A required value was absent. Generated code panics here; callers
    /// are expected to validate first.
    #[error("{0} is required")]
    Required(String),

    #[error("{path} must be {expected}")]
    Type { path: String, expected: &'static str },
}

// =============================================================================
// Validation
// =============================================================================

/// Validates the request body of `method`.
///
/// Methods whose request body needs no validation always succeed.
pub fn validate_request(artifacts: &ServiceArtifacts, method: &str, body: &Value) -> Result<(), MultiError> {
    let Some(shapes) = artifacts.method(method) else {
        return Ok(());
    };
    let validator = match shapes.request.as_ref().and_then(|r| r.shape.as_ref()) {
        Some(subject @ ShapeRef::Named(_)) => artifacts.validators.iter().find(|v| &v.subject == subject),
        Some(ShapeRef::Primitive(_)) => artifacts
            .validators
            .iter()
            .find(|v| v.method.as_deref() == Some(method)),
        _ => None,
    };
    match validator {
        Some(v) => validate(artifacts, &v.name, body),
        None => Ok(()),
    }
}

/// Runs the validator named `name` on `body`.
pub fn validate(artifacts: &ServiceArtifacts, name: &str, body: &Value) -> Result<(), MultiError> {
    let mut err = MultiError::new();
    if let Some(validator) = artifacts.validator(name) {
        for check in &validator.checks {
            run_check(artifacts, check, body, &mut err);
        }
    }
    err.into_result()
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn run_check(artifacts: &ServiceArtifacts, check: &Check, body: &Value, err: &mut MultiError) {
    match check {
        Check::Missing { wire_name, absence, .. } => {
            let value = present(body.get(wire_name));
            let missing = match (absence, value) {
                (_, None) => true,
                (Absence::Empty, Some(v)) => length_of(v) == Some(0),
                _ => false,
            };
            if missing {
                err.push(missing_field_error(wire_name, "body"));
            }
        }
        Check::Value { target, optional, checks } => {
            let value = match target {
                Target::Field { wire_name, .. } => body.get(wire_name),
                Target::Whole => Some(body),
            };
            let value = match present(value) {
                Some(v) => v,
                None if *optional => return,
                None => &Value::Null,
            };
            for check in checks {
                run_value_check(artifacts, check, value, err);
            }
        }
    }
}

fn run_value_check(artifacts: &ServiceArtifacts, check: &ValueCheck, value: &Value, err: &mut MultiError) {
    match check {
        ValueCheck::Rule(rule) => run_rule(rule, value, err),
        ValueCheck::Call { validator } => {
            if let Err(e) = validate(artifacts, validator, value) {
                err.merge(e);
            }
        }
        ValueCheck::Elements(inner) => {
            for element in value.as_array().into_iter().flatten() {
                for check in inner {
                    run_value_check(artifacts, check, element, err);
                }
            }
        }
        ValueCheck::Keys(inner) => {
            for key in value.as_object().into_iter().flat_map(Map::keys) {
                let key = key_value(key);
                for check in inner {
                    run_value_check(artifacts, check, &key, err);
                }
            }
        }
        ValueCheck::Values(inner) => {
            for element in value.as_object().into_iter().flat_map(Map::values) {
                for check in inner {
                    run_value_check(artifacts, check, element, err);
                }
            }
        }
    }
}

/// Map keys travel as strings; numeric and boolean keys are read back.
fn key_value(key: &str) -> Value {
    match serde_json::from_str::<Value>(key) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) => v,
        _ => Value::String(key.to_string()),
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        Value::Object(o) => Some(o.len()),
        Value::Null => Some(0),
        _ => None,
    }
}

fn run_rule(rule: &Rule, value: &Value, err: &mut MultiError) {
    let path = rule.path.as_str();
    match &rule.kind {
        RuleKind::Enum(values) => {
            if !values.iter().any(|allowed| same_value(allowed, value)) {
                let allowed: Vec<Json<'_>> = values.iter().map(Json).collect();
                err.push(invalid_enum_value_error(path, Json(value), &allowed));
            }
        }
        RuleKind::Format(format) => {
            if let Some(s) = value.as_str() {
                if let Err(e) = validate_format(path, s, *format) {
                    err.push(e);
                }
            }
        }
        RuleKind::Pattern(pattern) => {
            if let Some(s) = value.as_str() {
                if let Err(e) = validate_pattern(path, s, pattern) {
                    err.push(e);
                }
            }
        }
        RuleKind::Minimum(bound) => {
            if let Some(n) = value.as_f64() {
                if n < *bound && !unsigned_below_zero(rule.subject, *bound) {
                    err.push(invalid_range_error(path, Json(value), bound, true));
                }
            }
        }
        RuleKind::Maximum(bound) => {
            if let Some(n) = value.as_f64() {
                if n > *bound {
                    err.push(invalid_range_error(path, Json(value), bound, false));
                }
            }
        }
        RuleKind::MinLength(bound) => {
            if let Some(len) = length_of(value).filter(|len| len < bound) {
                err.push(invalid_length_error(path, Json(value), len, *bound, true));
            }
        }
        RuleKind::MaxLength(bound) => {
            if let Some(len) = length_of(value).filter(|len| len > bound) {
                err.push(invalid_length_error(path, Json(value), len, *bound, false));
            }
        }
    }
}

fn unsigned_below_zero(subject: Subject, bound: f64) -> bool {
    matches!(subject, Subject::Primitive(p) if p.is_unsigned()) && bound < 0.0
}

/// Prints a JSON value the way `Debug` prints the matching Rust value.
struct Json<'a>(&'a Value);

impl fmt::Debug for Json<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// JSON equality that treats `1` and `1.0` as the same number.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// Builds the domain payload of `method` from a request body and the
/// values of its non-body parameters, keyed by field name.
pub fn decode_payload(
    artifacts: &ServiceArtifacts,
    method: &str,
    body: &Value,
    params: &Map<String, Value>,
) -> Result<Value, InterpError> {
    let ctor = constructor(artifacts, method, |k| matches!(k, ConstructorKind::Payload), "payload constructor")?;
    let mut eval = Eval {
        artifacts,
        params: Some(params),
    };
    eval.build(&ctor.build, body, Direction::Unmarshal)
}

/// Builds the response body of `method` from a domain result, rendered
/// through `view` when the result has views.
pub fn encode_response(
    artifacts: &ServiceArtifacts,
    method: &str,
    view: Option<&str>,
    result: &Value,
) -> Result<Value, InterpError> {
    let ctor = constructor(
        artifacts,
        method,
        |k| match k {
            ConstructorKind::Response { view: declared } => {
                declared.as_deref().unwrap_or(DEFAULT_VIEW) == view.unwrap_or(DEFAULT_VIEW)
            }
            _ => false,
        },
        "response builder",
    )?;
    let mut eval = Eval { artifacts, params: None };
    eval.build(&ctor.build, result, Direction::Marshal)
}

/// Builds the body of error `error` of `method` from a domain value.
pub fn encode_error(artifacts: &ServiceArtifacts, method: &str, error: &str, value: &Value) -> Result<Value, InterpError> {
    let ctor = constructor(
        artifacts,
        method,
        |k| matches!(k, ConstructorKind::Error { name } if name == error),
        "error builder",
    )?;
    let mut eval = Eval { artifacts, params: None };
    eval.build(&ctor.build, value, Direction::Marshal)
}

fn constructor<'a>(
    artifacts: &'a ServiceArtifacts,
    method: &str,
    kind: impl Fn(&ConstructorKind) -> bool,
    what: &'static str,
) -> Result<&'a Constructor, InterpError> {
    artifacts
        .conversions
        .constructors
        .iter()
        .find(|c| c.method == method && kind(&c.kind))
        .ok_or_else(|| InterpError::UnknownMethod {
            method: method.to_string(),
            what,
        })
}

struct Eval<'a> {
    artifacts: &'a ServiceArtifacts,
    params: Option<&'a Map<String, Value>>,
}

impl Eval<'_> {
    fn build(&mut self, build: &Build, source: &Value, direction: Direction) -> Result<Value, InterpError> {
        match build {
            Build::Value(conversion) => Ok(self
                .convert(conversion, Some(source), "value", direction)?
                .unwrap_or(Value::Null)),
            Build::Record { fields, .. } => {
                let mut out = Map::new();
                for assignment in fields {
                    let (read, write) = match direction {
                        Direction::Unmarshal => (&assignment.wire_name, &assignment.field),
                        Direction::Marshal => (&assignment.field, &assignment.wire_name),
                    };
                    let input = match assignment.source {
                        Source::Field => source.get(read),
                        Source::Param => self.params.and_then(|p| p.get(&assignment.field)),
                    };
                    let converted = self.convert(&assignment.conversion, input, &assignment.field, direction)?;
                    if let Some(value) = converted {
                        if direction == Direction::Marshal && omitted_on_wire(&value) {
                            continue;
                        }
                        out.insert(write.clone(), value);
                    }
                }
                Ok(Value::Object(out))
            }
        }
    }

    /// Converts one slot. `None` means the target slot is absent.
    fn convert(
        &mut self,
        conversion: &Conversion,
        input: Option<&Value>,
        name: &str,
        direction: Direction,
    ) -> Result<Option<Value>, InterpError> {
        let input = present(input);
        match (conversion.from, input) {
            (Slot::Optional, None) => match conversion.to {
                Slot::Optional => Ok(None),
                Slot::Value => conversion
                    .default
                    .clone()
                    .map(Some)
                    .ok_or_else(|| InterpError::Required(name.to_string())),
            },
            (Slot::Value, None) => {
                let empty = empty_value(&conversion.transform).ok_or_else(|| InterpError::Required(name.to_string()))?;
                Ok(Some(empty))
            }
            (_, Some(value)) => self.transform(&conversion.transform, value, name, direction).map(Some),
        }
    }

    fn transform(
        &mut self,
        transform: &Transform,
        value: &Value,
        path: &str,
        direction: Direction,
    ) -> Result<Value, InterpError> {
        match transform {
            Transform::Copy(_) => Ok(value.clone()),
            Transform::Helper(name) => {
                let helper = self
                    .artifacts
                    .conversions
                    .helper(name)
                    .ok_or_else(|| InterpError::UnknownFunction(name.clone()))?;
                self.build(&helper.build, value, direction)
            }
            Transform::Elements(inner) => {
                let elements = value.as_array().ok_or_else(|| InterpError::Type {
                    path: path.to_string(),
                    expected: "an array",
                })?;
                elements
                    .iter()
                    .map(|e| self.transform(inner, e, path, direction))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Transform::Entries { value: inner, .. } => {
                let entries = value.as_object().ok_or_else(|| InterpError::Type {
                    path: path.to_string(),
                    expected: "an object",
                })?;
                let mut out = Map::new();
                for (key, entry) in entries {
                    out.insert(key.clone(), self.transform(inner, entry, path, direction)?);
                }
                Ok(Value::Object(out))
            }
        }
    }
}

/// Value serde produces for an absent collection-like slot.
fn empty_value(transform: &Transform) -> Option<Value> {
    match transform {
        Transform::Elements(_) | Transform::Copy(Primitive::Bytes) => Some(Value::Array(Vec::new())),
        Transform::Entries { .. } => Some(Value::Object(Map::new())),
        Transform::Copy(Primitive::Any) => Some(Value::Null),
        _ => None,
    }
}

/// Wire fields serde skips when serializing a body.
fn omitted_on_wire(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
