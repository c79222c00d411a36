use serde_json::json;

use shapegen_runtime::{
    invalid_length_error, invalid_range_error, merge_errors, missing_field_error, validate_format,
    validate_pattern, ErrorClass, Format, MultiError, ServiceError, INTERNAL, MISSING_FIELD,
};

/// Shaped like the validators `shapegen` emits.
fn validate_user(name: Option<&str>, age: Option<i64>, email: Option<&str>) -> Result<(), MultiError> {
    let mut err = MultiError::new();
    if name.is_none() {
        err.push(missing_field_error("name", "body"));
    }
    if let Some(v) = name {
        if v.chars().count() > 8 {
            err.push(invalid_length_error("body.name", v, v.chars().count(), 8, false));
        }
    }
    if let Some(v) = age {
        if v < 18 {
            err.push(invalid_range_error("body.age", v, 18, true));
        }
    }
    if let Some(v) = email {
        if let Err(e) = validate_format("body.email", v, Format::Email) {
            err.push(e);
        }
    }
    err.into_result()
}

#[test]
fn collects_every_violation() {
    let err = validate_user(None, Some(12), Some("nope")).unwrap_err();

    let codes: Vec<_> = err.iter().map(|e| e.code.as_str()).collect();
    assert_eq!(codes, ["missing_field", "invalid_range", "invalid_format"]);
    let paths: Vec<_> = err.iter().map(|e| e.path.as_deref()).collect();
    assert_eq!(paths, [Some("body.name"), Some("body.age"), Some("body.email")]);
    assert_eq!(err.status(), 400);
}

#[test]
fn valid_input_passes() {
    assert!(validate_user(Some("ada"), Some(36), Some("ada@example.com")).is_ok());
    assert!(validate_user(Some("ada"), None, None).is_ok());
}

#[test]
fn display_joins_details() {
    let err = validate_user(Some("bartholomew"), Some(3), None).unwrap_err();
    let text = err.to_string();

    assert!(text.starts_with("length of body.name must be lesser or equal than 8"));
    assert!(text.contains(", body.age must be greater or equal than 18 but got value 3"));
}

#[test]
fn status_derivation() {
    let statuses = |list: &[u16]| -> MultiError {
        list.iter()
            .map(|s| ErrorClass::new("test", *s).error("test"))
            .collect()
    };

    assert_eq!(statuses(&[400, 400, 400]).status(), 400);
    assert_eq!(statuses(&[400, 500, 400]).status(), 500);
    assert_eq!(statuses(&[400, 401, 400]).status(), 400);
    assert_eq!(statuses(&[404, 409]).status(), 400);
}

#[test]
fn merge_flattens_nested_aggregates() {
    let first = MultiError::from(vec![MISSING_FIELD.error("a"), MISSING_FIELD.error("b")]);
    let second = INTERNAL.error("c");

    let merged = merge_errors(first, second);
    assert_eq!(merged.len(), 3);
    assert_eq!(merged.status(), 500);

    let merged = merge_errors(None::<MultiError>, MISSING_FIELD.error("only"));
    assert_eq!(merged.len(), 1);
    assert_eq!(merged.to_string(), "only");
}

#[test]
fn service_error_serialization() {
    let plain = missing_field_error("id", "body");
    assert_eq!(
        serde_json::to_value(&plain).unwrap(),
        json!({
            "code": "missing_field",
            "status": 400,
            "detail": "\"id\" is missing from body",
            "path": "body.id",
        })
    );

    let with_meta = plain.clone().with_meta("field", "id");
    let value = serde_json::to_value(&with_meta).unwrap();
    assert_eq!(value["meta"], json!({ "field": "id" }));

    let back: ServiceError = serde_json::from_value(value).unwrap();
    assert_eq!(back, with_meta);
}

#[test]
fn pattern_errors_name_the_pattern() {
    let err = validate_pattern("body.code", "abc", "^[0-9]+$").unwrap_err();
    assert_eq!(err.code, "invalid_pattern");
    assert!(err.detail.contains("^[0-9]+$"));
    assert!(validate_pattern("body.code", "123", "^[0-9]+$").is_ok());
}
