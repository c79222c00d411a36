//! Structure validation for descriptions.
//!
//! Checks that references resolve, that required-field sets and wire names
//! are consistent with their objects, that views only list real fields, and
//! that fields carried outside the body are scalars.

use std::collections::HashSet;

use crate::codegen::rust_types::is_identifier_like;
use crate::diagnostic::GenError;
use crate::ir::{Attribute, AttributeKind, Description, Location, Method, Primitive};

/// Validates the structure of the description.
pub fn validate_structure(desc: &Description) -> Result<(), GenError> {
    unique("type", desc.types.iter().map(|t| t.name.as_str()))?;
    unique("service", desc.services.iter().map(|s| s.name.as_str()))?;

    for user_type in &desc.types {
        let site = format!("type \"{}\"", user_type.name);
        identifier(&user_type.name, "the description")?;
        validate_attribute(desc, &user_type.attribute, &site)?;

        if user_type.has_views() && !matches!(
            desc.resolve(&user_type.attribute).map(|a| &a.kind),
            Some(AttributeKind::Object { .. })
        ) {
            return Err(GenError::ViewOnNonObject {
                type_name: user_type.name.clone(),
            });
        }
        unique("view", user_type.views.iter().map(|v| v.name.as_str()))?;
        for view in &user_type.views {
            for field in &view.fields {
                if user_type.attribute.field(field).is_none() {
                    return Err(GenError::UnknownViewField {
                        type_name: user_type.name.clone(),
                        view: view.name.clone(),
                        field: field.clone(),
                    });
                }
            }
        }
    }

    for service in &desc.services {
        identifier(&service.name, "the description")?;
        unique("method", service.methods.iter().map(|m| m.name.as_str()))?;
        for method in &service.methods {
            identifier(&method.name, &format!("service \"{}\"", service.name))?;
            let site = format!("service \"{}\" method \"{}\"", service.name, method.name);
            validate_method(desc, method, &site)?;
        }
    }

    Ok(())
}

fn validate_method(desc: &Description, method: &Method, site: &str) -> Result<(), GenError> {
    if let Some(payload) = &method.payload {
        let site = format!("{site} payload");
        validate_attribute(desc, payload, &site)?;
        validate_parameters(desc, payload, &site)?;
    }
    if let Some(result) = &method.result {
        validate_attribute(desc, result, &format!("{site} result"))?;
    }
    unique("error", method.errors.iter().map(|e| e.name.as_str()))?;
    for error in &method.errors {
        identifier(&error.name, site)?;
        validate_attribute(desc, &error.attribute, &format!("{site} error \"{}\"", error.name))?;
    }
    Ok(())
}

/// Non-body fields of a payload become scalar constructor parameters.
fn validate_parameters(desc: &Description, payload: &Attribute, site: &str) -> Result<(), GenError> {
    let Some(resolved) = desc.resolve(payload) else {
        return Ok(());
    };
    for field in resolved.fields() {
        let location = field.location();
        if location == Location::Body {
            continue;
        }
        let Some(attr) = desc.resolve(&field.attribute) else {
            continue;
        };
        let scalar = |a: &Attribute| {
            matches!(a.as_primitive(), Some(p) if p != Primitive::Any)
        };
        let ok = match &attr.kind {
            AttributeKind::Primitive { .. } => scalar(attr),
            AttributeKind::Array { element } => desc.resolve(element).is_some_and(scalar),
            _ => false,
        };
        if !ok {
            return Err(GenError::InvalidParameterType {
                location: location.name(),
                found: describe(attr),
                site: format!("{site}.{}", field.name),
            });
        }
    }
    Ok(())
}

fn validate_attribute(desc: &Description, attr: &Attribute, site: &str) -> Result<(), GenError> {
    match &attr.kind {
        AttributeKind::Primitive { .. } => {}
        AttributeKind::Object { fields } => {
            unique_fields(fields.iter().map(|f| f.name.as_str()), site)?;
            for field in fields {
                identifier(&field.name, site)?;
            }
            for required in &attr.required {
                if attr.field(required).is_none() {
                    return Err(GenError::UnknownRequiredField {
                        field: required.clone(),
                        site: site.to_string(),
                    });
                }
            }
            let mut wire_names = HashSet::new();
            for field in fields {
                if !wire_names.insert(field.wire_name()) {
                    return Err(GenError::DuplicateWireName {
                        wire_name: field.wire_name().to_string(),
                        site: site.to_string(),
                    });
                }
                validate_attribute(desc, &field.attribute, &format!("{site}.{}", field.name))?;
            }
        }
        AttributeKind::Array { element } => {
            validate_attribute(desc, element, &format!("{site}[*]"))?;
        }
        AttributeKind::Map { key, value } => {
            validate_attribute(desc, key, &format!("{site}[key]"))?;
            validate_attribute(desc, value, &format!("{site}[value]"))?;
            let key_ok = desc
                .resolve(key)
                .and_then(Attribute::as_primitive)
                .is_some_and(Primitive::is_key);
            if !key_ok {
                return Err(GenError::InvalidMapKey {
                    found: describe(key),
                    site: site.to_string(),
                });
            }
        }
        AttributeKind::UserType { name } => {
            resolve_type(desc, name, site)?;
        }
        AttributeKind::View { name, view } => {
            let user_type = resolve_type(desc, name, site)?;
            if user_type.view_fields(view).is_none() {
                return Err(GenError::UnknownView {
                    type_name: name.clone(),
                    view: view.clone(),
                    site: site.to_string(),
                });
            }
        }
    }
    validate_rule_values(desc, attr, site)
}

/// Enum values and defaults end up as literals of the attribute's type.
fn validate_rule_values(desc: &Description, attr: &Attribute, site: &str) -> Result<(), GenError> {
    let primitive = desc.resolve(attr).and_then(Attribute::as_primitive);
    let invalid = |rule, value: &serde_json::Value, expected: &str| GenError::InvalidRuleValue {
        rule,
        value: value.to_string(),
        expected: expected.to_string(),
        site: site.to_string(),
    };

    if let Some(p) = primitive.filter(|p| !p.is_self_nullable()) {
        if let Some(value) = attr.validation.values.iter().find(|v| !p.accepts(v)) {
            return Err(invalid("enum value", value, p.name()));
        }
    }
    if let Some(default) = &attr.default {
        match primitive {
            Some(p) if !p.is_self_nullable() && p.accepts(default) => {}
            Some(p) if !p.is_self_nullable() => return Err(invalid("default", default, p.name())),
            _ => return Err(invalid("default", default, "scalar attribute")),
        }
    }
    Ok(())
}

fn resolve_type<'a>(
    desc: &'a Description,
    name: &str,
    site: &str,
) -> Result<&'a crate::ir::UserType, GenError> {
    desc.user_type(name)
        .ok_or_else(|| GenError::UnknownTypeReference {
            name: name.to_string(),
            site: site.to_string(),
        })
}

/// Short human description of an attribute's type.
fn describe(attr: &Attribute) -> String {
    match &attr.kind {
        AttributeKind::Primitive { name } => name.name().to_string(),
        AttributeKind::Object { .. } => "object".to_string(),
        AttributeKind::Array { element } => format!("array of {}", describe(element)),
        AttributeKind::Map { key, value } => {
            format!("map of {} to {}", describe(key), describe(value))
        }
        AttributeKind::UserType { name } => format!("user type {name}"),
        AttributeKind::View { name, view } => format!("view {view} of {name}"),
    }
}

fn identifier(name: &str, site: &str) -> Result<(), GenError> {
    if is_identifier_like(name) {
        Ok(())
    } else {
        Err(GenError::InvalidName {
            name: name.to_string(),
            site: site.to_string(),
        })
    }
}

fn unique<'a>(kind: &'static str, names: impl Iterator<Item = &'a str>) -> Result<(), GenError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(GenError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

fn unique_fields<'a>(names: impl Iterator<Item = &'a str>, site: &str) -> Result<(), GenError> {
    unique("field", names).map_err(|e| match e {
        GenError::DuplicateName { name, .. } => GenError::DuplicateName {
            kind: "field",
            name: format!("{site}.{name}"),
        },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ErrorDef, Service, UserType, Validation, ViewDef};

    fn string() -> Attribute {
        Attribute::primitive(Primitive::String)
    }

    fn with_payload(payload: Attribute, types: Vec<UserType>) -> Description {
        Description {
            name: "api".to_string(),
            types,
            services: vec![Service {
                name: "svc".to_string(),
                methods: vec![Method {
                    name: "m".to_string(),
                    payload: Some(payload),
                    result: None,
                    errors: vec![],
                }],
                description: None,
            }],
        }
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

    #[test]
    fn test_accepts_valid_description() {
        let payload = Attribute::object([
            ("id", Attribute::primitive(Primitive::UInt).at(Location::Path)),
            ("tags", Attribute::array(string()).at(Location::Query)),
            ("item", Attribute::user_type("Item")),
        ])
        .with_required(["id"]);
        let desc = with_payload(payload, vec![user_type("Item", Attribute::object([("x", string())]))]);
        assert!(validate_structure(&desc).is_ok());
    }

    #[test]
    fn test_rejects_unknown_reference() {
        let payload = Attribute::object([("item", Attribute::user_type("Nope"))]);
        let err = validate_structure(&with_payload(payload, vec![])).unwrap_err();
        assert_eq!(
            err,
            GenError::UnknownTypeReference {
                name: "Nope".to_string(),
                site: "service \"svc\" method \"m\" payload.item".to_string(),
            }
        );
    }

    #[test]
    fn test_rejects_unknown_required_field() {
        let payload = Attribute::object([("a", string())]).with_required(["b"]);
        let err = validate_structure(&with_payload(payload, vec![])).unwrap_err();
        assert!(matches!(err, GenError::UnknownRequiredField { field, .. } if field == "b"));
    }

    #[test]
    fn test_rejects_duplicate_wire_names() {
        let payload = Attribute::object([("a", string()), ("b", string().with_wire_name("a"))]);
        let err = validate_structure(&with_payload(payload, vec![])).unwrap_err();
        assert!(matches!(err, GenError::DuplicateWireName { wire_name, .. } if wire_name == "a"));
    }

    #[test]
    fn test_rejects_object_in_header() {
        let payload = Attribute::object([(
            "h",
            Attribute::object([("x", string())]).at(Location::Header),
        )]);
        let err = validate_structure(&with_payload(payload, vec![])).unwrap_err();
        assert!(matches!(err, GenError::InvalidParameterType { location: "header", .. }));
    }

    #[test]
    fn test_rejects_float_map_key() {
        let payload = Attribute::object([(
            "m",
            Attribute::map(Attribute::primitive(Primitive::Float64), string()),
        )]);
        let err = validate_structure(&with_payload(payload, vec![])).unwrap_err();
        assert!(matches!(err, GenError::InvalidMapKey { .. }));
    }

    #[test]
    fn test_rejects_unknown_view_and_view_field() {
        let mut rt = user_type("Rt", Attribute::object([("x", string())]));
        let desc = with_payload(Attribute::view("Rt", "tiny"), vec![rt.clone()]);
        assert!(matches!(
            validate_structure(&desc).unwrap_err(),
            GenError::UnknownView { view, .. } if view == "tiny"
        ));

        rt.views.push(ViewDef {
            name: "tiny".to_string(),
            fields: vec!["y".to_string()],
        });
        let desc = with_payload(Attribute::view("Rt", "tiny"), vec![rt]);
        assert!(matches!(
            validate_structure(&desc).unwrap_err(),
            GenError::UnknownViewField { field, .. } if field == "y"
        ));
    }

    #[test]
    fn test_rejects_unusable_names() {
        let payload = Attribute::object([("2fast", string())]);
        let err = validate_structure(&with_payload(payload, vec![])).unwrap_err();
        assert!(matches!(err, GenError::InvalidName { name, .. } if name == "2fast"));
    }

    #[test]
    fn test_rejects_duplicate_errors() {
        let mut desc = with_payload(string(), vec![]);
        let error = ErrorDef {
            name: "not_found".to_string(),
            attribute: string(),
        };
        desc.services[0].methods[0].errors = vec![error.clone(), error];
        assert!(matches!(
            validate_structure(&desc).unwrap_err(),
            GenError::DuplicateName { kind: "error", .. }
        ));
    }

    #[test]
    fn test_rejects_enum_values_of_the_wrong_type() {
        let payload = Attribute::object([(
            "n",
            Attribute::primitive(Primitive::Int).with_validation(Validation::one_of(["a", "b"])),
        )]);
        let err = validate_structure(&with_payload(payload, vec![])).unwrap_err();
        assert_eq!(
            err,
            GenError::InvalidRuleValue {
                rule: "enum value",
                value: "\"a\"".to_string(),
                expected: "int".to_string(),
                site: "service \"svc\" method \"m\" payload.n".to_string(),
            }
        );

        let payload = Attribute::object([(
            "n",
            Attribute::primitive(Primitive::Int32).with_validation(Validation::one_of([1, 3_000_000_000i64])),
        )]);
        assert!(matches!(
            validate_structure(&with_payload(payload, vec![])).unwrap_err(),
            GenError::InvalidRuleValue { rule: "enum value", value, .. } if value == "3000000000"
        ));
    }

    #[test]
    fn test_rejects_defaults_of_the_wrong_type() {
        let payload = Attribute::object([("d", Attribute::primitive(Primitive::Int).with_default("ten"))]);
        let err = validate_structure(&with_payload(payload, vec![])).unwrap_err();
        assert!(matches!(
            err,
            GenError::InvalidRuleValue { rule: "default", expected, .. } if expected == "int"
        ));

        let payload = Attribute::object([("d", Attribute::array(string()).with_default(serde_json::json!(["x"])))]);
        assert!(matches!(
            validate_structure(&with_payload(payload, vec![])).unwrap_err(),
            GenError::InvalidRuleValue { rule: "default", .. }
        ));
    }

    #[test]
    fn test_accepts_matching_rule_values() {
        let level = user_type(
            "Level",
            Attribute::primitive(Primitive::UInt32).with_validation(Validation::one_of([1, 2, 3])),
        );
        let payload = Attribute::object([
            ("level", Attribute::user_type("Level").with_default(2)),
            ("ratio", Attribute::primitive(Primitive::Float32).with_default(1)),
            ("mode", string().with_validation(Validation::one_of(["fast"])).with_default("fast")),
        ]);
        assert!(validate_structure(&with_payload(payload, vec![level])).is_ok());
    }
}
