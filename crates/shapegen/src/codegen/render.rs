//! Rust source emission for server types.
//!
//! Turns the shape, validation and conversion plans of one service into a
//! single source file. Sections are emitted in a fixed order: body types,
//! response and error builders, payload constructors, validators, helpers.

use serde_json::Value;

use crate::ir::{Primitive, Service};

use super::converters::{Assignment, Build, Constructor, ConstructorKind, Conversion, Conversions, Helper, Source, Transform};
use super::registry::Direction;
use super::rust_types::{primitive_type, rust_ident, to_snake_case};
use super::shapes::{BodyKind, Shape, ShapeArena, ShapeKind, ShapeRef, Slot};
use super::validators::{Absence, Check, Rule, RuleKind, Subject, Target, ValueCheck, Validator};

/// Everything a service file is rendered from.
pub struct ServiceFile<'a> {
    pub service: &'a Service,
    pub runtime_crate: &'a str,
    pub shapes: &'a ShapeArena,
    pub validators: &'a [Validator],
    pub conversions: &'a Conversions,
}

/// Renders the server types file of a service.
pub fn render_service(file: &ServiceFile<'_>) -> String {
    let service = &file.service.name;
    let mut code = String::new();

    code.push_str(&format!(
        r#"// Code generated by shapegen. DO NOT EDIT.
//
// {service} HTTP server types
#![allow(unused_imports, dead_code, clippy::all)]

use std::collections::BTreeMap;

use serde::{{Deserialize, Serialize}};

use {runtime} as runtime;
"#,
        runtime = file.runtime_crate,
    ));

    for shape in file.shapes.iter() {
        code.push('\n');
        code.push_str(&render_shape(service, shape, file.shapes));
    }

    for ctor in &file.conversions.constructors {
        if !matches!(ctor.kind, ConstructorKind::Payload) {
            code.push('\n');
            code.push_str(&render_builder(service, ctor));
        }
    }
    for ctor in &file.conversions.constructors {
        if matches!(ctor.kind, ConstructorKind::Payload) {
            code.push('\n');
            code.push_str(&render_payload_constructor(service, ctor));
        }
    }

    for validator in file.validators {
        code.push('\n');
        code.push_str(&render_validator(validator));
    }

    for helper in &file.conversions.helpers {
        code.push('\n');
        code.push_str(&render_helper(helper));
    }

    code
}

// =============================================================================
// Types
// =============================================================================

/// Wire type of a shape reference.
pub fn wire_type(shape: &ShapeRef) -> String {
    match shape {
        ShapeRef::Primitive(p) => primitive_type(*p).to_string(),
        ShapeRef::Named(name) => name.clone(),
        ShapeRef::Array(element) => format!("Vec<{}>", wire_type(element)),
        ShapeRef::Map(key, value) => {
            format!("BTreeMap<{}, {}>", primitive_type(*key), wire_type(value))
        }
    }
}

fn slot_type(shape: &ShapeRef, slot: Slot, arena: &ShapeArena) -> String {
    match (slot, shape) {
        (Slot::Value, _) => wire_type(shape),
        (Slot::Optional, ShapeRef::Named(name)) if !arena.is_collection_like(shape) => {
            format!("Option<Box<{name}>>")
        }
        (Slot::Optional, _) => format!("Option<{}>", wire_type(shape)),
    }
}

fn shape_doc(service: &str, shape: &Shape) -> String {
    let mut doc = match &shape.owner {
        Some(owner) => {
            let body = match &owner.kind {
                BodyKind::Request => "request body".to_string(),
                BodyKind::Response { .. } => "response body".to_string(),
                BodyKind::Error { name } => format!("response body for the \"{name}\" error"),
            };
            format!(
                "/// {} is the type of the \"{service}\" service \"{}\" endpoint HTTP {body}.\n",
                shape.name, owner.method
            )
        }
        None => format!("/// {} is used to define fields on {} body types.\n", shape.name, role_word(shape)),
    };
    if let Some(description) = &shape.description {
        doc.push_str("///\n");
        for line in description.lines() {
            doc.push_str(&format!("/// {line}\n"));
        }
    }
    doc
}

fn role_word(shape: &Shape) -> &'static str {
    match shape.role {
        super::registry::Role::Request => "request",
        super::registry::Role::Response => "response",
    }
}

fn render_shape(service: &str, shape: &Shape, arena: &ShapeArena) -> String {
    let mut code = shape_doc(service, shape);
    match &shape.kind {
        ShapeKind::Alias(target) => {
            code.push_str(&format!("pub type {} = {};\n", shape.name, wire_type(target)));
        }
        ShapeKind::Record(fields) => {
            code.push_str("#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]\n");
            if fields.is_empty() {
                code.push_str(&format!("pub struct {} {{}}\n", shape.name));
                return code;
            }
            code.push_str(&format!("pub struct {} {{\n", shape.name));
            for field in fields {
                if let Some(description) = &field.attribute.description {
                    for line in description.lines() {
                        code.push_str(&format!("    /// {line}\n"));
                    }
                }
                let ident = rust_ident(&field.name);
                let mut serde = Vec::new();
                if ident.trim_start_matches("r#") != field.wire_name {
                    serde.push(format!("rename = {:?}", field.wire_name));
                }
                if let Some(skip) = skip_if(&field.shape, field.slot) {
                    serde.push("default".to_string());
                    serde.push(format!("skip_serializing_if = {skip:?}"));
                } else if field.slot == Slot::Value && arena.is_collection_like(&field.shape) {
                    serde.push("default".to_string());
                }
                if !serde.is_empty() {
                    code.push_str(&format!("    #[serde({})]\n", serde.join(", ")));
                }
                code.push_str(&format!(
                    "    pub {ident}: {},\n",
                    slot_type(&field.shape, field.slot, arena)
                ));
            }
            code.push_str("}\n");
        }
    }
    code
}

fn skip_if(shape: &ShapeRef, slot: Slot) -> Option<&'static str> {
    if slot == Slot::Optional {
        return Some("Option::is_none");
    }
    match shape {
        ShapeRef::Array(_) | ShapeRef::Primitive(Primitive::Bytes) => Some("Vec::is_empty"),
        ShapeRef::Map(..) => Some("BTreeMap::is_empty"),
        ShapeRef::Primitive(Primitive::Any) => Some("serde_json::Value::is_null"),
        _ => None,
    }
}

// =============================================================================
// Constructors
// =============================================================================

fn render_builder(service: &str, ctor: &Constructor) -> String {
    let Some(body) = &ctor.body else {
        return String::new();
    };
    let body_type = wire_type(body);
    let what = match &ctor.kind {
        ConstructorKind::Error { name } => format!("the \"{name}\" error"),
        _ => "the result".to_string(),
    };
    let mut code = format!(
        "/// {} builds the HTTP response body from {what} of the \"{}\"\n/// endpoint of the \"{service}\" service.\n",
        ctor.name, ctor.method
    );
    code.push_str(&format!(
        "pub fn {}(res: &{}) -> {body_type} {{\n",
        ctor.name, ctor.domain
    ));
    code.push_str(&render_build(&ctor.build, "res", 1));
    code.push_str("}\n");
    code
}

fn render_payload_constructor(service: &str, ctor: &Constructor) -> String {
    let mut code = format!(
        "/// {} builds a {service} service {} endpoint payload.\n",
        ctor.name, ctor.method
    );
    let mut params = Vec::new();
    if let Some(body) = &ctor.body {
        params.push(format!("body: &{}", wire_type(body)));
    }
    for param in &ctor.params {
        let ty = wire_type(&param.shape);
        let ty = match param.slot {
            Slot::Optional => format!("Option<{ty}>"),
            Slot::Value => ty,
        };
        params.push(format!("{}: {ty}", rust_ident(&param.name)));
    }
    code.push_str(&format!(
        "pub fn {}({}) -> {} {{\n",
        ctor.name,
        params.join(", "),
        ctor.domain
    ));
    code.push_str(&render_build(&ctor.build, "body", 1));
    code.push_str("}\n");
    code
}

fn render_helper(helper: &Helper) -> String {
    let (from, to) = match helper.direction {
        Direction::Unmarshal => (helper.body.as_str(), helper.domain.as_str()),
        Direction::Marshal => (helper.domain.as_str(), helper.body.as_str()),
    };
    let mut code = format!(
        "/// {} builds a value of type {to} from a value of type {from}.\n",
        helper.name
    );
    code.push_str(&format!("fn {}(v: &{from}) -> {to} {{\n", helper.name));
    code.push_str(&render_build(&helper.build, "v", 1));
    code.push_str("}\n");
    code
}

fn indent(level: usize) -> String {
    "    ".repeat(level)
}

fn render_build(build: &Build, source: &str, level: usize) -> String {
    let pad = indent(level);
    match build {
        Build::Value(conversion) => {
            let place = format!("(*{source})");
            format!("{pad}{}\n", convert(conversion, &place, source))
        }
        Build::Record { target, fields } => {
            if fields.is_empty() {
                return format!("{pad}{target} {{}}\n");
            }
            let mut code = format!("{pad}{target} {{\n");
            for assignment in fields {
                let ident = rust_ident(&assignment.field);
                let expr = assignment_expr(assignment, source);
                if expr == ident {
                    code.push_str(&format!("{pad}    {ident},\n"));
                } else {
                    code.push_str(&format!("{pad}    {ident}: {expr},\n"));
                }
            }
            code.push_str(&format!("{pad}}}\n"));
            code
        }
    }
}

fn assignment_expr(assignment: &Assignment, source: &str) -> String {
    let ident = rust_ident(&assignment.field);
    match assignment.source {
        Source::Param => ident,
        Source::Field => {
            let place = format!("{source}.{ident}");
            convert(&assignment.conversion, &place, &assignment.field)
        }
    }
}

/// Expression converting the value at `place` as described by `conversion`.
fn convert(conversion: &Conversion, place: &str, name: &str) -> String {
    let expect = format!("expect({:?})", format!("{name} is required"));
    match (&conversion.transform, conversion.from, conversion.to) {
        (Transform::Copy(p), from, to) => {
            let copied = copy_place(*p, place);
            match (from, to) {
                (Slot::Value, Slot::Value) | (Slot::Optional, Slot::Optional) => copied,
                (Slot::Value, Slot::Optional) => format!("Some({copied})"),
                (Slot::Optional, Slot::Value) => match &conversion.default {
                    Some(default) if p.is_copy() => {
                        format!("{copied}.unwrap_or({})", literal(*p, default))
                    }
                    Some(default) => {
                        format!("{copied}.unwrap_or_else(|| {})", literal(*p, default))
                    }
                    None => format!("{copied}.{expect}"),
                },
            }
        }
        (Transform::Helper(helper), from, to) => match (from, to) {
            (Slot::Optional, Slot::Optional) => {
                format!("{place}.as_deref().map(|x| Box::new({helper}(x)))")
            }
            (Slot::Optional, Slot::Value) => format!("{helper}({place}.as_deref().{expect})"),
            (Slot::Value, Slot::Optional) => format!("Some(Box::new({helper}(&{place})))"),
            (Slot::Value, Slot::Value) => format!("{helper}(&{place})"),
        },
        (transform, _, _) => collection(transform, place, 1),
    }
}

fn copy_place(p: Primitive, place: &str) -> String {
    if p.is_copy() {
        place.to_string()
    } else {
        format!("{place}.clone()")
    }
}

/// Element-wise conversion of a collection held at `place`.
fn collection(transform: &Transform, place: &str, depth: usize) -> String {
    if is_identity(transform) {
        return format!("{place}.clone()");
    }
    let var = if depth == 1 { "x".to_string() } else { format!("x{depth}") };
    match transform {
        Transform::Elements(inner) => format!(
            "{place}.iter().map(|{var}| {}).collect()",
            element(inner, &var, depth)
        ),
        Transform::Entries { key, value } => {
            let key_var = if depth == 1 { "k".to_string() } else { format!("k{depth}") };
            format!(
                "{place}.iter().map(|({key_var}, {var})| ({}, {})).collect()",
                copy_ref(*key, &key_var),
                element(value, &var, depth)
            )
        }
        Transform::Copy(p) => copy_place(*p, place),
        Transform::Helper(helper) => format!("{helper}(&{place})"),
    }
}

/// Conversion of an element borrowed as `var`.
fn element(transform: &Transform, var: &str, depth: usize) -> String {
    match transform {
        Transform::Copy(p) => copy_ref(*p, var),
        Transform::Helper(helper) => format!("{helper}({var})"),
        Transform::Elements(_) | Transform::Entries { .. } => collection(transform, var, depth + 1),
    }
}

fn copy_ref(p: Primitive, var: &str) -> String {
    if p.is_copy() {
        format!("*{var}")
    } else {
        format!("{var}.clone()")
    }
}

fn is_identity(transform: &Transform) -> bool {
    match transform {
        Transform::Copy(_) => true,
        Transform::Helper(_) => false,
        Transform::Elements(inner) => is_identity(inner),
        Transform::Entries { value, .. } => is_identity(value),
    }
}

/// Rust literal of a default value.
fn literal(p: Primitive, value: &Value) -> String {
    match (p, value) {
        (Primitive::String, Value::String(s)) => format!("{s:?}.to_string()"),
        (Primitive::Boolean, Value::Bool(b)) => b.to_string(),
        (p, Value::Number(n)) if p.is_float() => float_literal(n.as_f64().unwrap_or_default()),
        (p, Value::Number(n)) if p.is_integer() => n.to_string(),
        _ => "Default::default()".to_string(),
    }
}

fn float_literal(f: f64) -> String {
    let s = f.to_string();
    if s.contains(['.', 'e', 'E']) || !f.is_finite() {
        s
    } else {
        format!("{s}.0")
    }
}

// =============================================================================
// Validators
// =============================================================================

/// A value being checked, as it appears in generated code.
struct Operand {
    expr: String,
    /// Whether `expr` is a reference to the value.
    by_ref: bool,
}

impl Operand {
    fn value(&self) -> String {
        if self.by_ref {
            format!("*{}", self.expr)
        } else {
            self.expr.clone()
        }
    }

    fn reference(&self) -> String {
        if self.by_ref {
            self.expr.clone()
        } else {
            format!("&{}", self.expr)
        }
    }

    fn call(&self, method: &str) -> String {
        format!("{}.{method}", self.expr)
    }
}

fn render_validator(validator: &Validator) -> String {
    let subject = wire_type(&validator.subject);
    let mut code = format!(
        "/// {} runs the validations defined on {}.\n",
        validator.name,
        match &validator.subject {
            ShapeRef::Named(name) => name.clone(),
            _ => format!("the {} request body", validator.method.as_deref().unwrap_or("")),
        }
    );
    code.push_str(&format!(
        "pub fn {}(body: &{subject}) -> Result<(), runtime::MultiError> {{\n",
        validator.name
    ));
    code.push_str("    let mut err = runtime::MultiError::new();\n");
    for check in &validator.checks {
        code.push_str(&render_check(check));
    }
    code.push_str("    err.into_result()\n");
    code.push_str("}\n");
    code
}

fn render_check(check: &Check) -> String {
    match check {
        Check::Missing { name, wire_name, absence } => {
            let field = format!("body.{}", rust_ident(name));
            let test = match absence {
                Absence::Unset => format!("{field}.is_none()"),
                Absence::Empty => format!("{field}.is_empty()"),
                Absence::Null => format!("{field}.is_null()"),
            };
            format!(
                "    if {test} {{\n        err.push(runtime::missing_field_error({wire_name:?}, \"body\"));\n    }}\n"
            )
        }
        Check::Value { target, optional, checks } => {
            let place = match target {
                Target::Field { name, .. } => format!("body.{}", rust_ident(name)),
                Target::Whole => "body".to_string(),
            };
            let mut code = String::new();
            if *optional {
                code.push_str(&format!("    if let Some(v) = &{place} {{\n"));
                let operand = Operand {
                    expr: "v".to_string(),
                    by_ref: true,
                };
                for check in checks {
                    code.push_str(&render_value_check(check, &operand, 2, 1));
                }
                code.push_str("    }\n");
            } else {
                let operand = match target {
                    Target::Whole => Operand {
                        expr: "body".to_string(),
                        by_ref: true,
                    },
                    Target::Field { .. } => Operand {
                        expr: place,
                        by_ref: false,
                    },
                };
                for check in checks {
                    code.push_str(&render_value_check(check, &operand, 1, 1));
                }
            }
            code
        }
    }
}

fn render_value_check(check: &ValueCheck, operand: &Operand, level: usize, depth: usize) -> String {
    let pad = indent(level);
    match check {
        ValueCheck::Rule(rule) => render_rule(rule, operand, level),
        ValueCheck::Call { validator } => format!(
            "{pad}if let Err(e) = {validator}({}) {{\n{pad}    err.merge(e);\n{pad}}}\n",
            operand.reference()
        ),
        ValueCheck::Elements(inner) => {
            let var = numbered("e", depth);
            nested_loop(&format!("for {var} in {}", operand.call("iter()")), &var, inner, level, depth)
        }
        ValueCheck::Keys(inner) => {
            let var = numbered("k", depth);
            nested_loop(&format!("for {var} in {}", operand.call("keys()")), &var, inner, level, depth)
        }
        ValueCheck::Values(inner) => {
            let var = numbered("val", depth);
            nested_loop(&format!("for {var} in {}", operand.call("values()")), &var, inner, level, depth)
        }
    }
}

fn numbered(base: &str, depth: usize) -> String {
    if depth == 1 {
        base.to_string()
    } else {
        format!("{base}{depth}")
    }
}

fn nested_loop(head: &str, var: &str, inner: &[ValueCheck], level: usize, depth: usize) -> String {
    let pad = indent(level);
    let operand = Operand {
        expr: var.to_string(),
        by_ref: true,
    };
    let mut code = format!("{pad}{head} {{\n");
    for check in inner {
        code.push_str(&render_value_check(check, &operand, level + 1, depth + 1));
    }
    code.push_str(&format!("{pad}}}\n"));
    code
}

fn render_rule(rule: &Rule, operand: &Operand, level: usize) -> String {
    let pad = indent(level);
    let path = &rule.path;
    let push = |condition: String, error: String| {
        format!("{pad}if {condition} {{\n{pad}    err.push({error});\n{pad}}}\n")
    };
    let result = |call: String| format!("{pad}if let Err(e) = {call} {{\n{pad}    err.push(e);\n{pad}}}\n");

    match (&rule.kind, rule.subject) {
        (RuleKind::Enum(values), Subject::Primitive(p)) => {
            let literals: Vec<String> = values.iter().map(|v| enum_literal(p, v)).collect();
            let list = format!("[{}]", literals.join(", "));
            let candidate = if p == Primitive::String {
                format!("&{}", operand.call("as_str()"))
            } else {
                format!("&{}", operand.value())
            };
            push(
                format!("!{list}.contains({candidate})"),
                format!(
                    "runtime::invalid_enum_value_error({path:?}, {}, &{list})",
                    operand.reference()
                ),
            )
        }
        (RuleKind::Format(format), _) => result(format!(
            "runtime::validate_format({path:?}, {}, runtime::Format::{})",
            operand.reference(),
            format.variant_name()
        )),
        (RuleKind::Pattern(pattern), _) => result(format!(
            "runtime::validate_pattern({path:?}, {}, {pattern:?})",
            operand.reference()
        )),
        (RuleKind::Minimum(bound), Subject::Primitive(p)) => {
            let error = format!(
                "runtime::invalid_range_error({path:?}, {}, {}, true)",
                operand.value(),
                reported_bound(p, *bound)
            );
            match bound_check(p, *bound, true) {
                BoundCheck::Never => String::new(),
                BoundCheck::Always => format!("{pad}err.push({error});\n"),
                BoundCheck::Compare(bound) => push(format!("{} < {bound}", operand.value()), error),
            }
        }
        (RuleKind::Maximum(bound), Subject::Primitive(p)) => {
            let error = format!(
                "runtime::invalid_range_error({path:?}, {}, {}, false)",
                operand.value(),
                reported_bound(p, *bound)
            );
            match bound_check(p, *bound, false) {
                BoundCheck::Never => String::new(),
                BoundCheck::Always => format!("{pad}err.push({error});\n"),
                BoundCheck::Compare(bound) => push(format!("{} > {bound}", operand.value()), error),
            }
        }
        (RuleKind::MinLength(bound), subject) => {
            let len = length(operand, subject);
            push(
                format!("{len} < {bound}"),
                format!(
                    "runtime::invalid_length_error({path:?}, {}, {len}, {bound}, true)",
                    operand.reference()
                ),
            )
        }
        (RuleKind::MaxLength(bound), subject) => {
            let len = length(operand, subject);
            push(
                format!("{len} > {bound}"),
                format!(
                    "runtime::invalid_length_error({path:?}, {}, {len}, {bound}, false)",
                    operand.reference()
                ),
            )
        }
        _ => String::new(),
    }
}

fn length(operand: &Operand, subject: Subject) -> String {
    match subject {
        Subject::Primitive(Primitive::String) => operand.call("chars().count()"),
        _ => operand.call("len()"),
    }
}

fn enum_literal(p: Primitive, value: &Value) -> String {
    match (p, value) {
        (Primitive::String, Value::String(s)) => format!("{s:?}"),
        (p, Value::Number(n)) if p.is_float() => float_literal(n.as_f64().unwrap_or_default()),
        (_, other) => other.to_string(),
    }
}

/// How a range rule is checked against values of one primitive type.
#[derive(Debug, PartialEq)]
enum BoundCheck {
    /// No value of the type can break the bound.
    Never,
    /// Every value of the type breaks the bound.
    Always,
    /// Compare against this literal, which fits the type.
    Compare(String),
}

/// Integer bounds are rounded inward and compared in `i128` against the
/// range of the Rust type the primitive maps to.
fn bound_check(p: Primitive, bound: f64, min: bool) -> BoundCheck {
    if let Some((lo, hi)) = p.integer_range() {
        let rounded = if min { bound.ceil() } else { bound.floor() };
        let n = rounded as i128;
        return match (min, n) {
            (true, n) if n <= lo => BoundCheck::Never,
            (true, n) if n > hi => BoundCheck::Always,
            (false, n) if n >= hi => BoundCheck::Never,
            (false, n) if n < lo => BoundCheck::Always,
            (_, n) => BoundCheck::Compare(n.to_string()),
        };
    }
    if p == Primitive::Float32 && bound.abs() > f64::from(f32::MAX) {
        return if min == (bound > 0.0) {
            BoundCheck::Always
        } else {
            BoundCheck::Never
        };
    }
    BoundCheck::Compare(float_literal(bound))
}

/// Bound as it reads in error details: the declared value, not the
/// rounded literal.
fn reported_bound(p: Primitive, bound: f64) -> String {
    if p.is_float() {
        float_literal(bound)
    } else {
        format!("{:?}", bound.to_string())
    }
}

/// Name of the file a service's server types are written to.
pub fn service_file_name(service: &Service) -> String {
    format!("{}/server_types.rs", to_snake_case(&service.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_copies_and_requires() {
        let required = Conversion {
            from: Slot::Optional,
            to: Slot::Value,
            transform: Transform::Copy(Primitive::String),
            default: None,
        };
        assert_eq!(
            convert(&required, "body.name", "name"),
            "body.name.clone().expect(\"name is required\")"
        );

        let defaulted = Conversion {
            default: Some(Value::from(10)),
            transform: Transform::Copy(Primitive::Int),
            ..required.clone()
        };
        assert_eq!(convert(&defaulted, "body.limit", "limit"), "body.limit.unwrap_or(10)");

        let wrapped = Conversion {
            from: Slot::Value,
            to: Slot::Optional,
            transform: Transform::Copy(Primitive::Float64),
            default: None,
        };
        assert_eq!(convert(&wrapped, "res.score", "score"), "Some(res.score)");
    }

    #[test]
    fn test_convert_nested_records_and_collections() {
        let nested = Conversion {
            from: Slot::Optional,
            to: Slot::Optional,
            transform: Transform::Helper("unmarshal_foo".to_string()),
            default: None,
        };
        assert_eq!(
            convert(&nested, "v.foo", "foo"),
            "v.foo.as_deref().map(|x| Box::new(unmarshal_foo(x)))"
        );

        let items = Conversion {
            from: Slot::Value,
            to: Slot::Value,
            transform: Transform::Elements(Box::new(Transform::Helper("unmarshal_item".to_string()))),
            default: None,
        };
        assert_eq!(
            convert(&items, "v.items", "items"),
            "v.items.iter().map(|x| unmarshal_item(x)).collect()"
        );

        let plain = Conversion {
            transform: Transform::Entries {
                key: Primitive::String,
                value: Box::new(Transform::Elements(Box::new(Transform::Copy(Primitive::Int)))),
            },
            ..items
        };
        assert_eq!(convert(&plain, "v.m", "m"), "v.m.clone()");
    }

    #[test]
    fn test_literals() {
        assert_eq!(literal(Primitive::String, &Value::from("a")), "\"a\".to_string()");
        assert_eq!(literal(Primitive::Float64, &Value::from(2)), "2.0");
        assert_eq!(literal(Primitive::Boolean, &Value::from(true)), "true");
    }

    #[test]
    fn test_render_rule_guards() {
        let operand = Operand {
            expr: "v".to_string(),
            by_ref: true,
        };
        let rule = Rule {
            path: "body.age".to_string(),
            subject: Subject::Primitive(Primitive::Int),
            kind: RuleKind::Minimum(18.0),
        };
        assert_eq!(
            render_rule(&rule, &operand, 2),
            "        if *v < 18 {\n            err.push(runtime::invalid_range_error(\"body.age\", *v, \"18\", true));\n        }\n"
        );
    }

    #[test]
    fn test_bounds_follow_the_rust_type() {
        let compare = |s: &str| BoundCheck::Compare(s.to_string());

        assert_eq!(bound_check(Primitive::Int, 1.5, true), compare("2"));
        assert_eq!(bound_check(Primitive::Int, 1.5, false), compare("1"));
        assert_eq!(bound_check(Primitive::Float32, 0.5, false), compare("0.5"));

        // Outside i32, every value is within the bound
        assert_eq!(bound_check(Primitive::Int32, 3e9, false), BoundCheck::Never);
        assert_eq!(bound_check(Primitive::Int32, 3e9, true), BoundCheck::Always);
        assert_eq!(bound_check(Primitive::Int32, -3e9, true), BoundCheck::Never);

        // Above i64::MAX but inside u64
        assert_eq!(bound_check(Primitive::UInt64, 1e19, false), compare("10000000000000000000"));
        assert_eq!(bound_check(Primitive::UInt64, 2e19, false), BoundCheck::Never);

        assert_eq!(bound_check(Primitive::UInt, -1.0, true), BoundCheck::Never);
        assert_eq!(bound_check(Primitive::UInt, -1.0, false), BoundCheck::Always);
        assert_eq!(bound_check(Primitive::UInt32, 0.0, true), BoundCheck::Never);

        assert_eq!(bound_check(Primitive::Float32, 1e40, false), BoundCheck::Never);
        assert_eq!(bound_check(Primitive::Float32, -1e40, false), BoundCheck::Always);
    }

    #[test]
    fn test_render_range_rules_per_type() {
        let operand = Operand {
            expr: "v".to_string(),
            by_ref: true,
        };
        let rule = |p, kind| Rule {
            path: "body.n".to_string(),
            subject: Subject::Primitive(p),
            kind,
        };

        assert_eq!(render_rule(&rule(Primitive::Int32, RuleKind::Maximum(3e9)), &operand, 1), "");
        assert_eq!(
            render_rule(&rule(Primitive::UInt64, RuleKind::Maximum(1e19)), &operand, 1),
            "    if *v > 10000000000000000000 {\n        err.push(runtime::invalid_range_error(\"body.n\", *v, \"10000000000000000000\", false));\n    }\n"
        );
        assert_eq!(
            render_rule(&rule(Primitive::UInt, RuleKind::Maximum(-1.0)), &operand, 1),
            "    err.push(runtime::invalid_range_error(\"body.n\", *v, \"-1\", false));\n"
        );
        assert_eq!(
            render_rule(&rule(Primitive::Float64, RuleKind::Minimum(0.5)), &operand, 1),
            "    if *v < 0.5 {\n        err.push(runtime::invalid_range_error(\"body.n\", *v, 0.5, true));\n    }\n"
        );
    }
}
