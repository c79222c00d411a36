//! Detection of required-reference cycles.
//!
//! A user type that reaches itself only through required, non-collection
//! fields describes an infinitely large value. Cycles that go through an
//! optional field, an array or a map are fine: the generated code stops
//! descending once the named artifact exists.

use std::collections::HashMap;

use crate::ir::{Attribute, AttributeKind, Description};

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// Returns the first required cycle found, as the list of type names with
/// the starting type repeated at the end (`["A", "B", "A"]`).
///
/// Types are visited in declaration order so the reported chain is stable.
pub fn find_required_cycle(desc: &Description) -> Option<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();
    for user_type in &desc.types {
        if let Some(chain) = visit(desc, &user_type.name, &mut marks, &mut stack) {
            return Some(chain);
        }
    }
    None
}

fn visit<'a>(
    desc: &'a Description,
    name: &'a str,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    match marks.get(name) {
        Some(Mark::Done) => return None,
        Some(Mark::Visiting) => {
            let start = stack.iter().position(|n| *n == name).unwrap_or(0);
            let mut chain: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
            chain.push(name.to_string());
            return Some(chain);
        }
        None => {}
    }
    let user_type = desc.user_type(name)?;

    marks.insert(name, Mark::Visiting);
    stack.push(name);
    let mut edges = Vec::new();
    required_references(&user_type.attribute, &mut edges);
    for next in edges {
        if let Some(chain) = visit(desc, next, marks, stack) {
            return Some(chain);
        }
    }
    stack.pop();
    marks.insert(name, Mark::Done);
    None
}

/// Collects the user types a value of `attr` must contain.
fn required_references<'a>(attr: &'a Attribute, out: &mut Vec<&'a str>) {
    match &attr.kind {
        AttributeKind::UserType { name } | AttributeKind::View { name, .. } => out.push(name),
        AttributeKind::Object { fields } => {
            for field in fields {
                if attr.is_required(&field.name) {
                    required_references(&field.attribute, out);
                }
            }
        }
        AttributeKind::Primitive { .. } | AttributeKind::Array { .. } | AttributeKind::Map { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Primitive, UserType};

    fn user_type(name: &str, attribute: Attribute) -> UserType {
        UserType {
            name: name.to_string(),
            module: None,
            attribute,
            views: vec![],
            description: None,
        }
    }

    fn desc(types: Vec<UserType>) -> Description {
        Description {
            name: "api".to_string(),
            types,
            services: vec![],
        }
    }

    #[test]
    fn test_self_reference_through_required_field() {
        let d = desc(vec![user_type(
            "A",
            Attribute::object([("next", Attribute::user_type("A"))]).with_required(["next"]),
        )]);
        assert_eq!(find_required_cycle(&d), Some(vec!["A".to_string(), "A".to_string()]));
    }

    #[test]
    fn test_mutual_cycle_reports_chain() {
        let d = desc(vec![
            user_type(
                "A",
                Attribute::object([("b", Attribute::user_type("B"))]).with_required(["b"]),
            ),
            user_type(
                "B",
                Attribute::object([(
                    "inner",
                    Attribute::object([("a", Attribute::user_type("A"))]).with_required(["a"]),
                )])
                .with_required(["inner"]),
            ),
        ]);
        assert_eq!(
            find_required_cycle(&d),
            Some(vec!["A".to_string(), "B".to_string(), "A".to_string()])
        );
    }

    #[test]
    fn test_cycles_broken_by_optional_or_collection_are_legal() {
        let d = desc(vec![
            user_type(
                "Node",
                Attribute::object([
                    ("value", Attribute::primitive(Primitive::Int)),
                    ("next", Attribute::user_type("Node")),
                    ("children", Attribute::array(Attribute::user_type("Node"))),
                    (
                        "index",
                        Attribute::map(
                            Attribute::primitive(Primitive::String),
                            Attribute::user_type("Node"),
                        ),
                    ),
                ])
                .with_required(["value", "children", "index"]),
            ),
        ]);
        assert_eq!(find_required_cycle(&d), None);
    }
}
