//! Validation plans for request bodies.
//!
//! Every request body type gets a plan of checks in three phases: missing
//! required fields, then constraint rules on present values, then calls to
//! the validators of nested body types. Plans that end up checking nothing
//! are dropped, together with every call to them.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::ir::{Attribute, AttributeKind, Description, Format, Primitive, Validation};

use super::registry::{ArtifactKey, NameRegistry, Role};
use super::rust_types::to_snake_case;
use super::shapes::{MethodShapes, ShapeArena, ShapeKind, ShapeRef, Slot};

/// A validator function.
#[derive(Debug, Clone, PartialEq)]
pub struct Validator {
    pub name: String,
    /// Type of the value being validated.
    pub subject: ShapeRef,
    /// Owning method, for validators of primitive method-level bodies.
    pub method: Option<String>,
    pub checks: Vec<Check>,
}

/// How a missing required value is recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absence {
    /// `None` in an optional slot.
    Unset,
    /// An empty collection or byte string.
    Empty,
    /// A JSON `null` in an `any` slot.
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Field { name: String, wire_name: String },
    /// The validated value itself.
    Whole,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    Missing {
        name: String,
        wire_name: String,
        absence: Absence,
    },
    /// Checks on one value; skipped when `optional` and the value is absent.
    Value {
        target: Target,
        optional: bool,
        checks: Vec<ValueCheck>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueCheck {
    Rule(Rule),
    /// Call to another validator.
    Call { validator: String },
    Elements(Vec<ValueCheck>),
    Keys(Vec<ValueCheck>),
    Values(Vec<ValueCheck>),
}

/// What a rule constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Primitive(Primitive),
    Collection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Path reported in errors, e.g. `body.items[*]`.
    pub path: String,
    pub subject: Subject,
    pub kind: RuleKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    Enum(Vec<Value>),
    Format(Format),
    Pattern(String),
    Minimum(f64),
    Maximum(f64),
    MinLength(usize),
    MaxLength(usize),
}

/// Builds the validators of every request body of a service.
///
/// Returned in emission order: method-level bodies first, then nested body
/// types in discovery order.
pub fn synthesize_validators(
    desc: &Description,
    arena: &ShapeArena,
    methods: &[MethodShapes],
    registry: &mut NameRegistry,
) -> Vec<Validator> {
    let mut plans: Vec<(ShapeRef, Option<String>, Vec<Check>)> = Vec::new();

    for method in methods {
        let Some(request) = &method.request else {
            continue;
        };
        if let Some(ShapeRef::Primitive(p)) = &request.shape {
            let checks = value_checks(desc, &request.attribute, &ShapeRef::Primitive(*p), "body");
            let (rules, calls) = partition(checks);
            plans.push((
                ShapeRef::Primitive(*p),
                Some(method.method.clone()),
                whole(rules).into_iter().chain(whole(calls)).collect(),
            ));
        }
    }
    for shape in arena.iter().filter(|s| s.role == Role::Request) {
        let checks = match &shape.kind {
            ShapeKind::Record(fields) => {
                let mut missing = Vec::new();
                let mut rules = Vec::new();
                let mut calls = Vec::new();
                for field in fields {
                    if field.required {
                        missing.push(Check::Missing {
                            name: field.name.clone(),
                            wire_name: field.wire_name.clone(),
                            absence: absence(field.slot, &field.shape),
                        });
                    }
                    let path = format!("body.{}", field.wire_name);
                    let (r, c) = partition(value_checks(desc, &field.attribute, &field.shape, &path));
                    let target = Target::Field {
                        name: field.name.clone(),
                        wire_name: field.wire_name.clone(),
                    };
                    let optional = field.slot == Slot::Optional;
                    if !r.is_empty() {
                        rules.push(Check::Value { target: target.clone(), optional, checks: r });
                    }
                    if !c.is_empty() {
                        calls.push(Check::Value { target, optional, checks: c });
                    }
                }
                missing.into_iter().chain(rules).chain(calls).collect()
            }
            ShapeKind::Alias(target) => {
                let (rules, calls) = partition(value_checks(desc, &shape.attribute, target, "body"));
                whole(rules).into_iter().chain(whole(calls)).collect()
            }
        };
        plans.push((ShapeRef::Named(shape.name.clone()), None, checks));
    }

    let nontrivial = nontrivial_shapes(&plans);
    let keep = |subject: &ShapeRef, checks: &[Check]| match subject {
        ShapeRef::Named(name) => nontrivial.contains(name.as_str()),
        _ => !checks.is_empty(),
    };

    let mut names = HashMap::new();
    for (subject, method, checks) in &plans {
        if !keep(subject, checks) {
            continue;
        }
        let key_name = match (subject, method) {
            (ShapeRef::Named(name), _) => name.clone(),
            (_, Some(method)) => format!("{method}RequestBody"),
            _ => continue,
        };
        let candidate = format!("validate_{}", to_snake_case(&key_name));
        let (name, _) = registry.lookup_or_reserve(
            ArtifactKey::Validator { body: key_name.clone() },
            &candidate,
            "",
        );
        names.insert(key_name, name);
    }

    let mut validators = Vec::new();
    for (subject, method, checks) in &plans {
        if !keep(subject, checks) {
            continue;
        }
        let key_name = match (subject, method) {
            (ShapeRef::Named(name), _) => name.clone(),
            (_, Some(method)) => format!("{method}RequestBody"),
            _ => continue,
        };
        let Some(name) = names.get(&key_name) else {
            continue;
        };
        validators.push(Validator {
            name: name.clone(),
            subject: subject.clone(),
            method: method.clone(),
            checks: prune_checks(checks, &nontrivial, &names),
        });
    }
    validators
}

fn whole(checks: Vec<ValueCheck>) -> Option<Check> {
    (!checks.is_empty()).then_some(Check::Value {
        target: Target::Whole,
        optional: false,
        checks,
    })
}

fn absence(slot: Slot, shape: &ShapeRef) -> Absence {
    match (slot, shape) {
        (Slot::Optional, _) => Absence::Unset,
        (Slot::Value, ShapeRef::Primitive(Primitive::Any)) => Absence::Null,
        (Slot::Value, _) => Absence::Empty,
    }
}

/// Rules and calls for one value. Calls name shapes until pruning maps
/// them to validator names.
fn value_checks(desc: &Description, attr: &Attribute, shape: &ShapeRef, path: &str) -> Vec<ValueCheck> {
    let resolved = desc.resolve(attr).unwrap_or(attr);
    let validation = if attr.validation.is_empty() {
        &resolved.validation
    } else {
        &attr.validation
    };

    let mut checks = Vec::new();
    match shape {
        ShapeRef::Primitive(p) => primitive_rules(*p, validation, path, &mut checks),
        ShapeRef::Array(element) => {
            length_rules(Subject::Collection, validation, path, &mut checks);
            if let AttributeKind::Array { element: element_attr } = &resolved.kind {
                let inner = value_checks(desc, element_attr, element, &format!("{path}[*]"));
                if !inner.is_empty() {
                    checks.push(ValueCheck::Elements(inner));
                }
            }
        }
        ShapeRef::Map(key, value) => {
            length_rules(Subject::Collection, validation, path, &mut checks);
            if let AttributeKind::Map { key: key_attr, value: value_attr } = &resolved.kind {
                let keys = value_checks(desc, key_attr, &ShapeRef::Primitive(*key), &format!("{path}[key]"));
                if !keys.is_empty() {
                    checks.push(ValueCheck::Keys(keys));
                }
                let values = value_checks(desc, value_attr, value, &format!("{path}[*]"));
                if !values.is_empty() {
                    checks.push(ValueCheck::Values(values));
                }
            }
        }
        ShapeRef::Named(name) => {
            // Rules declared on the referenced type itself run inside its
            // own validator.
            if !matches!(resolved.kind, AttributeKind::Object { .. }) {
                length_rules(Subject::Collection, &attr.validation, path, &mut checks);
            }
            checks.push(ValueCheck::Call { validator: name.clone() });
        }
    }
    checks
}

fn primitive_rules(p: Primitive, validation: &Validation, path: &str, out: &mut Vec<ValueCheck>) {
    let rule = |kind| {
        ValueCheck::Rule(Rule {
            path: path.to_string(),
            subject: Subject::Primitive(p),
            kind,
        })
    };
    match p {
        Primitive::Any => {}
        Primitive::Bytes => length_rules(Subject::Primitive(p), validation, path, out),
        Primitive::String => {
            if !validation.values.is_empty() {
                out.push(rule(RuleKind::Enum(validation.values.clone())));
            }
            if let Some(format) = validation.format {
                out.push(rule(RuleKind::Format(format)));
            }
            if let Some(pattern) = &validation.pattern {
                out.push(rule(RuleKind::Pattern(pattern.clone())));
            }
            length_rules(Subject::Primitive(p), validation, path, out);
        }
        _ => {
            if !validation.values.is_empty() {
                out.push(rule(RuleKind::Enum(validation.values.clone())));
            }
            if p.is_numeric() {
                if let Some(min) = validation.minimum {
                    out.push(rule(RuleKind::Minimum(min)));
                }
                if let Some(max) = validation.maximum {
                    out.push(rule(RuleKind::Maximum(max)));
                }
            }
        }
    }
}

fn length_rules(subject: Subject, validation: &Validation, path: &str, out: &mut Vec<ValueCheck>) {
    let rule = |kind| {
        ValueCheck::Rule(Rule {
            path: path.to_string(),
            subject,
            kind,
        })
    };
    if let Some(min) = validation.min_length {
        out.push(rule(RuleKind::MinLength(min)));
    }
    if let Some(max) = validation.max_length {
        out.push(rule(RuleKind::MaxLength(max)));
    }
}

/// Splits checks into constraint rules and nested validator calls,
/// keeping the element, key and value structure of each.
fn partition(checks: Vec<ValueCheck>) -> (Vec<ValueCheck>, Vec<ValueCheck>) {
    let mut rules = Vec::new();
    let mut calls = Vec::new();
    for check in checks {
        match check {
            ValueCheck::Rule(_) => rules.push(check),
            ValueCheck::Call { .. } => calls.push(check),
            ValueCheck::Elements(inner) => split(inner, ValueCheck::Elements, &mut rules, &mut calls),
            ValueCheck::Keys(inner) => split(inner, ValueCheck::Keys, &mut rules, &mut calls),
            ValueCheck::Values(inner) => split(inner, ValueCheck::Values, &mut rules, &mut calls),
        }
    }
    (rules, calls)
}

fn split(
    inner: Vec<ValueCheck>,
    wrap: fn(Vec<ValueCheck>) -> ValueCheck,
    rules: &mut Vec<ValueCheck>,
    calls: &mut Vec<ValueCheck>,
) {
    let (r, c) = partition(inner);
    if !r.is_empty() {
        rules.push(wrap(r));
    }
    if !c.is_empty() {
        calls.push(wrap(c));
    }
}

/// Shapes whose validator checks something, directly or through a call.
///
/// Computed as a fixpoint so that recursive types whose only checks are
/// calls to themselves come out trivial.
fn nontrivial_shapes(plans: &[(ShapeRef, Option<String>, Vec<Check>)]) -> HashSet<&str> {
    let mut nontrivial: HashSet<&str> = plans
        .iter()
        .filter_map(|(subject, _, checks)| match subject {
            ShapeRef::Named(name) if checks.iter().any(has_direct_check) => Some(name.as_str()),
            _ => None,
        })
        .collect();

    loop {
        let mut changed = false;
        for (subject, _, checks) in plans {
            let ShapeRef::Named(name) = subject else {
                continue;
            };
            if nontrivial.contains(name.as_str()) {
                continue;
            }
            if checks.iter().any(|c| calls_any(c, &nontrivial)) {
                nontrivial.insert(name.as_str());
                changed = true;
            }
        }
        if !changed {
            return nontrivial;
        }
    }
}

fn has_direct_check(check: &Check) -> bool {
    fn direct(check: &ValueCheck) -> bool {
        match check {
            ValueCheck::Rule(_) => true,
            ValueCheck::Call { .. } => false,
            ValueCheck::Elements(inner) | ValueCheck::Keys(inner) | ValueCheck::Values(inner) => {
                inner.iter().any(direct)
            }
        }
    }
    match check {
        Check::Missing { .. } => true,
        Check::Value { checks, .. } => checks.iter().any(direct),
    }
}

fn calls_any(check: &Check, targets: &HashSet<&str>) -> bool {
    fn calls(check: &ValueCheck, targets: &HashSet<&str>) -> bool {
        match check {
            ValueCheck::Rule(_) => false,
            ValueCheck::Call { validator } => targets.contains(validator.as_str()),
            ValueCheck::Elements(inner) | ValueCheck::Keys(inner) | ValueCheck::Values(inner) => {
                inner.iter().any(|c| calls(c, targets))
            }
        }
    }
    match check {
        Check::Missing { .. } => false,
        Check::Value { checks, .. } => checks.iter().any(|c| calls(c, targets)),
    }
}

/// Drops calls to trivial validators and containers left empty, and maps
/// the remaining calls from shape names to validator names.
fn prune_checks(checks: &[Check], nontrivial: &HashSet<&str>, names: &HashMap<String, String>) -> Vec<Check> {
    fn prune(checks: &[ValueCheck], nontrivial: &HashSet<&str>, names: &HashMap<String, String>) -> Vec<ValueCheck> {
        checks
            .iter()
            .filter_map(|check| match check {
                ValueCheck::Rule(_) => Some(check.clone()),
                ValueCheck::Call { validator } => {
                    if !nontrivial.contains(validator.as_str()) {
                        return None;
                    }
                    names.get(validator).map(|name| ValueCheck::Call { validator: name.clone() })
                }
                ValueCheck::Elements(inner) => {
                    let inner = prune(inner, nontrivial, names);
                    (!inner.is_empty()).then_some(ValueCheck::Elements(inner))
                }
                ValueCheck::Keys(inner) => {
                    let inner = prune(inner, nontrivial, names);
                    (!inner.is_empty()).then_some(ValueCheck::Keys(inner))
                }
                ValueCheck::Values(inner) => {
                    let inner = prune(inner, nontrivial, names);
                    (!inner.is_empty()).then_some(ValueCheck::Values(inner))
                }
            })
            .collect()
    }

    checks
        .iter()
        .filter_map(|check| match check {
            Check::Missing { .. } => Some(check.clone()),
            Check::Value { target, optional, checks } => {
                let checks = prune(checks, nontrivial, names);
                (!checks.is_empty()).then(|| Check::Value {
                    target: target.clone(),
                    optional: *optional,
                    checks,
                })
            }
        })
        .collect()
}
