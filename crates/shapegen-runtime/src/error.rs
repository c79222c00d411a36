//! # Structured Errors
//!
//! Every violation detected by generated code is reported as a
//! [`ServiceError`]: a stable machine-readable `code`, the status class the
//! transport should use, a human readable `detail`, the dotted path of the
//! offending body field when there is one, and optional metadata.
//!
//! Errors are produced through [`ErrorClass`] values. The class fixes the code
//! and status; the constructor functions below fix the wording of `detail`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::validate::Format;

// =============================================================================
// Error Classes
// =============================================================================

/// A family of errors sharing one code and one status.
///
/// It is the responsibility of the caller to keep codes unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorClass {
    pub code: &'static str,
    pub status: u16,
}

impl ErrorClass {
    pub const fn new(code: &'static str, status: u16) -> Self {
        Self { code, status }
    }

    /// Creates an error of this class with the given detail.
    pub fn error(&self, detail: impl Into<String>) -> ServiceError {
        ServiceError {
            code: self.code.to_string(),
            status: self.status,
            detail: detail.into(),
            path: None,
            meta: BTreeMap::new(),
        }
    }
}

/// A request parameter could not be converted to the described type.
pub const INVALID_PARAM_TYPE: ErrorClass = ErrorClass::new("invalid_parameter_type", 400);

/// A required request parameter is missing.
pub const MISSING_PARAM: ErrorClass = ErrorClass::new("missing_parameter", 400);

/// A body field does not have the described type.
pub const INVALID_FIELD_TYPE: ErrorClass = ErrorClass::new("invalid_field_type", 400);

/// A required body field is missing.
pub const MISSING_FIELD: ErrorClass = ErrorClass::new("missing_field", 400);

/// A value is not one of the enumerated values.
pub const INVALID_ENUM_VALUE: ErrorClass = ErrorClass::new("invalid_value", 400);

/// A required header is missing.
pub const MISSING_HEADER: ErrorClass = ErrorClass::new("missing_header", 400);

/// A string value does not match its declared format.
pub const INVALID_FORMAT: ErrorClass = ErrorClass::new("invalid_format", 400);

/// A string value does not match its declared pattern.
pub const INVALID_PATTERN: ErrorClass = ErrorClass::new("invalid_pattern", 400);

/// A numeric value is outside its declared bounds.
pub const INVALID_RANGE: ErrorClass = ErrorClass::new("invalid_range", 400);

/// A string or collection length is outside its declared bounds.
pub const INVALID_LENGTH: ErrorClass = ErrorClass::new("invalid_length", 400);

/// A request body could not be decoded.
pub const INVALID_ENCODING: ErrorClass = ErrorClass::new("invalid_encoding", 400);

/// Anything that is not the client's fault.
pub const INTERNAL: ErrorClass = ErrorClass::new("internal", 500);

// =============================================================================
// ServiceError
// =============================================================================

/// One structured error, ready to be serialized into a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{detail}")]
pub struct ServiceError {
    /// Identifies the class of error for client programs.
    pub code: String,
    /// Status used by responses that carry the error.
    pub status: u16,
    /// Describes this specific occurrence.
    pub detail: String,
    /// Dotted path of the offending field, rooted at `body`. Unset for
    /// parameters, headers and decoding failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Additional key/value pairs useful to clients.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Value>,
}

impl ServiceError {
    /// Sets the field path.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Adds a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// `name` is missing from `context` (e.g. `"body"`). The path is
/// `context.name`.
pub fn missing_field_error(name: &str, context: &str) -> ServiceError {
    MISSING_FIELD
        .error(format!("{name:?} is missing from {context}"))
        .at(format!("{context}.{name}"))
}

/// A required parameter is missing.
pub fn missing_param_error(name: &str) -> ServiceError {
    MISSING_PARAM.error(format!("missing required parameter {name:?}"))
}

/// A required header is missing.
pub fn missing_header_error(name: &str) -> ServiceError {
    MISSING_HEADER.error(format!("missing required HTTP header {name:?}"))
}

/// A field holds a value of the wrong type.
pub fn invalid_field_type_error(name: &str, value: &Value, expected: &str) -> ServiceError {
    INVALID_FIELD_TYPE
        .error(format!("{name:?} must be {expected} but got value {value}"))
        .at(name)
}

/// A parameter holds a value that cannot be converted to `expected`.
pub fn invalid_param_type_error(name: &str, value: &str, expected: &str) -> ServiceError {
    INVALID_PARAM_TYPE.error(format!(
        "invalid value {value:?} for parameter {name:?}, must be a {expected}"
    ))
}

/// `value` is not one of `allowed`.
pub fn invalid_enum_value_error<V: fmt::Debug, A: fmt::Debug>(
    name: &str,
    value: V,
    allowed: &[A],
) -> ServiceError {
    let allowed = allowed
        .iter()
        .map(|a| format!("{a:?}"))
        .collect::<Vec<_>>()
        .join(", ");
    INVALID_ENUM_VALUE
        .error(format!(
            "value of {name} must be one of {allowed} but got value {value:?}"
        ))
        .at(name)
}

/// `value` is not formatted as `format`.
pub fn invalid_format_error(
    name: &str,
    value: &str,
    format: Format,
    reason: impl fmt::Display,
) -> ServiceError {
    INVALID_FORMAT
        .error(format!(
            "{name} must be formatted as a {format} but got value {value:?}, {reason}"
        ))
        .at(name)
}

/// `value` does not match `pattern`.
pub fn invalid_pattern_error(name: &str, value: &str, pattern: &str) -> ServiceError {
    INVALID_PATTERN
        .error(format!(
            "{name} must match the regexp {pattern:?} but got value {value:?}"
        ))
        .at(name)
}

/// `value` is below (`min`) or above (`!min`) `bound`.
pub fn invalid_range_error<V: fmt::Debug, B: fmt::Display>(
    name: &str,
    value: V,
    bound: B,
    min: bool,
) -> ServiceError {
    let comp = if min { "greater or equal" } else { "lesser or equal" };
    INVALID_RANGE
        .error(format!(
            "{name} must be {comp} than {bound} but got value {value:?}"
        ))
        .at(name)
}

/// The length `len` of `value` is below (`min`) or above (`!min`) `bound`.
pub fn invalid_length_error<V: fmt::Debug>(
    name: &str,
    value: V,
    len: usize,
    bound: usize,
    min: bool,
) -> ServiceError {
    let comp = if min { "greater or equal" } else { "lesser or equal" };
    INVALID_LENGTH
        .error(format!(
            "length of {name} must be {comp} than {bound} but got value {value:?} (len={len})"
        ))
        .at(name)
}

/// The request body could not be decoded.
pub fn invalid_encoding_error(reason: impl fmt::Display) -> ServiceError {
    INVALID_ENCODING.error(format!("failed to decode request body: {reason}"))
}

/// Unexpected condition on the server side.
pub fn internal_error(detail: impl Into<String>) -> ServiceError {
    INTERNAL.error(detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_sets_code_and_status() {
        let err = MISSING_FIELD.error("boom");
        assert_eq!(err.code, "missing_field");
        assert_eq!(err.status, 400);
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_missing_field_detail() {
        let err = missing_field_error("array", "body");
        assert_eq!(err.detail, "\"array\" is missing from body");
        assert_eq!(err.path.as_deref(), Some("body.array"));
    }

    #[test]
    fn test_range_and_length_wording() {
        let err = invalid_range_error("body.count", 12, 10, false);
        assert_eq!(err.code, "invalid_range");
        assert_eq!(err.detail, "body.count must be lesser or equal than 10 but got value 12");
        assert_eq!(err.path.as_deref(), Some("body.count"));

        let err = invalid_length_error("body.name", "ab", 2, 3, true);
        assert_eq!(
            err.detail,
            "length of body.name must be greater or equal than 3 but got value \"ab\" (len=2)"
        );
    }

    #[test]
    fn test_enum_lists_allowed_values() {
        let err = invalid_enum_value_error("body.kind", "c", &["a", "b"]);
        assert_eq!(
            err.detail,
            "value of body.kind must be one of \"a\", \"b\" but got value \"c\""
        );
    }

    #[test]
    fn test_meta_is_serialized_only_when_present() {
        let err = missing_param_error("id");
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.get("meta").is_none());
        assert!(json.get("path").is_none());

        let err = err.with_meta("param", "id");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["meta"]["param"], "id");
        assert_eq!(json["status"], 400);
    }
}
