use serde_json::{json, Map, Value};

use shapegen::interp::{self, InterpError};
use shapegen::ir::{
    Attribute, Description, ErrorDef, Format, Location, Method, Primitive, Service, UserType, Validation, ViewDef,
};
use shapegen::{Generator, GeneratorConfig, ServiceArtifacts};

fn p(name: Primitive) -> Attribute {
    Attribute::primitive(name)
}

fn user_type(name: &str, attribute: Attribute) -> UserType {
    UserType {
        name: name.to_string(),
        module: None,
        attribute,
        views: vec![],
        description: None,
    }
}

fn service(types: Vec<UserType>, methods: Vec<Method>) -> ServiceArtifacts {
    let desc = Description {
        name: "api".to_string(),
        types,
        services: vec![Service {
            name: "svc".to_string(),
            methods,
            description: None,
        }],
    };
    Generator::new(GeneratorConfig::default())
        .generate_from(&desc)
        .unwrap()
        .remove(0)
}

fn payload_method(name: &str, payload: Attribute) -> Method {
    Method {
        name: name.to_string(),
        payload: Some(payload),
        result: None,
        errors: vec![],
    }
}

fn mixed_payload() -> ServiceArtifacts {
    let nested = user_type(
        "Nested",
        Attribute::object([("value", p(Primitive::String))]).with_required(["value"]),
    );
    let payload = Attribute::object([
        ("values", Attribute::array(p(Primitive::Float64))),
        ("a", Attribute::user_type("Nested")),
        ("b", Attribute::user_type("Nested").with_wire_name("other")),
    ])
    .with_required(["values", "a", "b"]);
    service(vec![nested], vec![payload_method("MethodA", payload)])
}

fn details(err: &shapegen_runtime::MultiError) -> Vec<&str> {
    err.iter().map(|e| e.detail.as_str()).collect()
}

fn paths(err: &shapegen_runtime::MultiError) -> Vec<&str> {
    err.iter().filter_map(|e| e.path.as_deref()).collect()
}

#[test]
fn every_missing_field_is_reported() {
    let svc = mixed_payload();

    let err = interp::validate_request(&svc, "MethodA", &json!({})).unwrap_err();
    assert_eq!(
        details(&err),
        [
            "\"values\" is missing from body",
            "\"a\" is missing from body",
            "\"other\" is missing from body",
        ]
    );
    assert_eq!(paths(&err), ["body.values", "body.a", "body.other"]);
    assert_eq!(err.status(), 400);

    // Null reads as absent, an empty array as missing
    let err = interp::validate_request(
        &svc,
        "MethodA",
        &json!({ "values": [], "a": null, "other": { "value": "x" } }),
    )
    .unwrap_err();
    assert_eq!(err.len(), 2);
}

#[test]
fn nested_validator_runs_for_each_present_reference() {
    let svc = mixed_payload();

    let err = interp::validate_request(
        &svc,
        "MethodA",
        &json!({ "values": [1.5], "a": {}, "other": {} }),
    )
    .unwrap_err();
    assert_eq!(
        details(&err),
        ["\"value\" is missing from body", "\"value\" is missing from body"]
    );

    let ok = json!({ "values": [1.5], "a": { "value": "x" }, "other": { "value": "y" } });
    assert!(interp::validate_request(&svc, "MethodA", &ok).is_ok());
}

#[test]
fn decode_copies_the_body_into_the_payload() {
    let svc = mixed_payload();
    let body = json!({
        "values": [1.5, 2.0],
        "a": { "value": "x" },
        "other": { "value": "y" },
    });

    let payload = interp::decode_payload(&svc, "MethodA", &body, &Map::new()).unwrap();
    assert_eq!(
        payload,
        json!({
            "values": [1.5, 2.0],
            "a": { "value": "x" },
            "b": { "value": "y" },
        })
    );
}

#[test]
fn constraint_rules_are_checked_in_field_order() {
    let payload = Attribute::object([
        ("status", p(Primitive::String).with_validation(Validation::one_of(["open", "closed"]))),
        ("age", p(Primitive::Int).with_validation(Validation::range(Some(18.0), Some(130.0)))),
        ("name", p(Primitive::String).with_validation(Validation::length(Some(2), None))),
        ("email", p(Primitive::String).with_validation(Validation::format(Format::Email))),
        ("code", p(Primitive::String).with_validation(Validation::pattern("^[A-Z]{3}$"))),
        (
            "tags",
            Attribute::array(p(Primitive::String).with_validation(Validation::length(None, Some(3)))),
        ),
        (
            "scores",
            Attribute::map(
                p(Primitive::String),
                p(Primitive::Int).with_validation(Validation::range(Some(0.0), None)),
            ),
        ),
    ]);
    let svc = service(vec![], vec![payload_method("Register", payload)]);

    let body = json!({
        "status": "pending",
        "age": 12,
        "name": "a",
        "email": "nope",
        "code": "abc",
        "tags": ["ok", "toolong"],
        "scores": { "x": -1, "y": 5 },
    });
    let err = interp::validate_request(&svc, "Register", &body).unwrap_err();

    let codes: Vec<_> = err.iter().map(|e| e.code.as_str()).collect();
    assert_eq!(
        codes,
        [
            "invalid_value",
            "invalid_range",
            "invalid_length",
            "invalid_format",
            "invalid_pattern",
            "invalid_length",
            "invalid_range",
        ]
    );
    assert_eq!(
        paths(&err),
        [
            "body.status",
            "body.age",
            "body.name",
            "body.email",
            "body.code",
            "body.tags[*]",
            "body.scores[*]",
        ]
    );
    let details = details(&err);
    assert_eq!(
        details[0],
        "value of body.status must be one of \"open\", \"closed\" but got value \"pending\""
    );
    assert!(details[5].starts_with("length of body.tags[*] must be lesser or equal than 3"));
    assert!(details[6].starts_with("body.scores[*] must be greater or equal than 0"));

    let valid = json!({
        "status": "open",
        "age": 30,
        "name": "ada",
        "email": "ada@example.com",
        "code": "ABC",
        "tags": ["a"],
        "scores": { "x": 1 },
    });
    assert!(interp::validate_request(&svc, "Register", &valid).is_ok());
    // Every field is optional
    assert!(interp::validate_request(&svc, "Register", &json!({})).is_ok());
}

#[test]
fn map_keys_are_checked_as_their_declared_type() {
    let payload = Attribute::object([(
        "slots",
        Attribute::map(
            p(Primitive::Int).with_validation(Validation::range(Some(1.0), None)),
            p(Primitive::String),
        ),
    )]);
    let svc = service(vec![], vec![payload_method("Book", payload)]);

    let err = interp::validate_request(&svc, "Book", &json!({ "slots": { "0": "a", "3": "b" } })).unwrap_err();
    assert_eq!(
        details(&err),
        ["body.slots[key] must be greater or equal than 1 but got value 0"]
    );
}

#[test]
fn decode_merges_params_and_defaults() {
    let payload = Attribute::object([
        ("id", p(Primitive::UInt).at(Location::Path)),
        ("limit", p(Primitive::Int).with_default(10)),
        ("name", p(Primitive::String)),
        ("tags", Attribute::array(p(Primitive::String))),
    ])
    .with_required(["id", "name"]);
    let svc = service(vec![], vec![payload_method("List", payload)]);

    let mut params = Map::new();
    params.insert("id".to_string(), json!(7));

    let payload = interp::decode_payload(&svc, "List", &json!({ "name": "x" }), &params).unwrap();
    assert_eq!(payload, json!({ "id": 7, "limit": 10, "name": "x", "tags": [] }));

    let payload = interp::decode_payload(&svc, "List", &json!({ "name": "x", "limit": 3, "tags": ["t"] }), &params)
        .unwrap();
    assert_eq!(payload, json!({ "id": 7, "limit": 3, "name": "x", "tags": ["t"] }));

    // Decoding assumes a validated body
    let err = interp::decode_payload(&svc, "List", &json!({}), &params).unwrap_err();
    assert_eq!(err, InterpError::Required("name".to_string()));
}

#[test]
fn responses_are_rendered_through_views() {
    let mut rt = user_type(
        "Rt",
        Attribute::object([
            ("a", p(Primitive::String)),
            ("b", p(Primitive::Int)),
            ("tags", Attribute::array(p(Primitive::String))),
        ])
        .with_required(["a"]),
    );
    rt.views.push(ViewDef {
        name: "tiny".to_string(),
        fields: vec!["a".to_string()],
    });
    let get = Method {
        name: "Get".to_string(),
        payload: None,
        result: Some(Attribute::user_type("Rt")),
        errors: vec![],
    };
    let svc = service(vec![rt], vec![get]);

    let result = json!({ "a": "x", "b": 3, "tags": [] });
    assert_eq!(
        interp::encode_response(&svc, "Get", None, &result).unwrap(),
        json!({ "a": "x", "b": 3 })
    );
    assert_eq!(
        interp::encode_response(&svc, "Get", Some("tiny"), &result).unwrap(),
        json!({ "a": "x" })
    );
    assert_eq!(
        interp::encode_response(&svc, "Get", Some("tiny"), &json!({ "b": 3 })).unwrap_err(),
        InterpError::Required("a".to_string())
    );
    assert!(matches!(
        interp::encode_response(&svc, "Get", Some("huge"), &result),
        Err(InterpError::UnknownMethod { .. })
    ));
}

#[test]
fn error_bodies_encode_with_wire_names() {
    let failure = user_type(
        "Failure",
        Attribute::object([
            ("message", p(Primitive::String)),
            ("retry_after", p(Primitive::Int).with_wire_name("retryAfter")),
        ])
        .with_required(["message"]),
    );
    let create = Method {
        name: "Create".to_string(),
        payload: None,
        result: None,
        errors: vec![ErrorDef {
            name: "unavailable".to_string(),
            attribute: Attribute::user_type("Failure"),
        }],
    };
    let svc = service(vec![failure], vec![create]);

    let body = interp::encode_error(
        &svc,
        "Create",
        "unavailable",
        &json!({ "message": "later", "retry_after": 30 }),
    )
    .unwrap();
    assert_eq!(body, json!({ "message": "later", "retryAfter": 30 }));

    let body = interp::encode_error(&svc, "Create", "unavailable", &json!({ "message": "later" })).unwrap();
    assert_eq!(body, json!({ "message": "later" }));
}

#[test]
fn wire_body_round_trips_through_the_domain() {
    let item = user_type(
        "Item",
        Attribute::object([("sku", p(Primitive::String)), ("qty", p(Primitive::Int))]).with_required(["sku", "qty"]),
    );
    let order = Attribute::object([
        ("items", Attribute::array(Attribute::user_type("Item"))),
        ("notes", Attribute::map(p(Primitive::String), p(Primitive::String))),
    ]);
    let place = Method {
        name: "Place".to_string(),
        payload: Some(order.clone()),
        result: Some(order),
        errors: vec![],
    };
    let svc = service(vec![item], vec![place]);

    let body = json!({
        "items": [{ "sku": "a", "qty": 1 }, { "sku": "b", "qty": 2 }],
        "notes": { "gift": "yes" },
    });
    assert!(interp::validate_request(&svc, "Place", &body).is_ok());
    let domain = interp::decode_payload(&svc, "Place", &body, &Map::new()).unwrap();
    assert_eq!(domain, body);
    let back: Value = interp::encode_response(&svc, "Place", None, &domain).unwrap();
    assert_eq!(back, body);
}
