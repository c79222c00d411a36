//! Attribute schema model.
//!
//! The description is produced by an external front-end and loaded as JSON.
//! It is read-only once loaded: every generator pass borrows it immutably,
//! which is what allows services to be generated in parallel.

mod attribute;
mod validation;

pub use attribute::{Attribute, AttributeKind, Field, Location, Primitive};
pub use validation::{Format, Validation};

use serde::{Deserialize, Serialize};

use crate::diagnostic::GenError;

/// A complete service description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub name: String,

    /// Named user types, referenced from attributes by name.
    #[serde(default)]
    pub types: Vec<UserType>,

    #[serde(default)]
    pub services: Vec<Service>,
}

/// A named, reusable attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserType {
    pub name: String,

    /// Domain module holding the type when it is not the service's own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    pub attribute: Attribute,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<ViewDef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named subset of a result type's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDef {
    pub name: String,
    pub fields: Vec<String>,
}

/// One generation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,

    #[serde(default)]
    pub methods: Vec<Method>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Attribute>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Attribute>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDef>,
}

/// A named error a method may return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDef {
    pub name: String,
    pub attribute: Attribute,
}

/// Name of the view every user type implicitly has.
pub const DEFAULT_VIEW: &str = "default";

impl Description {
    /// Loads a description from its JSON form.
    pub fn from_json(source: &str) -> Result<Self, GenError> {
        serde_json::from_str(source).map_err(|e| GenError::InvalidDescription {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        })
    }

    pub fn user_type(&self, name: &str) -> Option<&UserType> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Follows user type references down to a concrete attribute.
    ///
    /// Returns `None` for dangling references and for reference chains that
    /// loop without ever reaching a concrete definition.
    pub fn resolve<'a>(&'a self, attr: &'a Attribute) -> Option<&'a Attribute> {
        let mut current = attr;
        for _ in 0..=self.types.len() {
            match current.type_reference() {
                Some(name) => current = &self.user_type(name)?.attribute,
                None => return Some(current),
            }
        }
        None
    }

    /// Whether any part of `attr` travels in the body.
    ///
    /// Non-object attributes are entirely body-located.
    pub fn has_body_fields(&self, attr: &Attribute) -> bool {
        match self.resolve(attr).map(|a| &a.kind) {
            Some(AttributeKind::Object { fields }) => {
                fields.iter().any(|f| f.location() == Location::Body)
            }
            Some(_) => true,
            None => false,
        }
    }
}

impl UserType {
    pub fn view(&self, name: &str) -> Option<&ViewDef> {
        self.views.iter().find(|v| v.name == name)
    }

    pub fn has_views(&self) -> bool {
        !self.views.is_empty()
    }

    /// Field names exposed by `view`.
    ///
    /// The default view exposes every field unless declared explicitly.
    pub fn view_fields(&self, view: &str) -> Option<Vec<&str>> {
        match self.view(view) {
            Some(def) => Some(def.fields.iter().map(String::as_str).collect()),
            None if view == DEFAULT_VIEW => Some(
                self.attribute
                    .fields()
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect(),
            ),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> Description {
        Description {
            name: "api".to_string(),
            types: vec![
                UserType {
                    name: "A".to_string(),
                    module: None,
                    attribute: Attribute::user_type("B"),
                    views: vec![],
                    description: None,
                },
                UserType {
                    name: "B".to_string(),
                    module: None,
                    attribute: Attribute::object([
                        ("x", Attribute::primitive(Primitive::String)),
                        ("y", Attribute::primitive(Primitive::Int).at(Location::Header)),
                    ]),
                    views: vec![ViewDef {
                        name: "tiny".to_string(),
                        fields: vec!["x".to_string()],
                    }],
                    description: None,
                },
                UserType {
                    name: "Loop".to_string(),
                    module: None,
                    attribute: Attribute::user_type("Loop"),
                    views: vec![],
                    description: None,
                },
            ],
            services: vec![],
        }
    }

    #[test]
    fn test_resolve_follows_chains() {
        let desc = description();
        let a = Attribute::user_type("A");
        let resolved = desc.resolve(&a).unwrap();
        assert_eq!(resolved.fields().len(), 2);
        assert!(desc.resolve(&Attribute::user_type("Missing")).is_none());
        assert!(desc.resolve(&Attribute::user_type("Loop")).is_none());
    }

    #[test]
    fn test_has_body_fields() {
        let desc = description();
        assert!(desc.has_body_fields(&Attribute::user_type("B")));
        let headers_only = Attribute::object([(
            "h",
            Attribute::primitive(Primitive::String).at(Location::Header),
        )]);
        assert!(!desc.has_body_fields(&headers_only));
        assert!(desc.has_body_fields(&Attribute::primitive(Primitive::String)));
    }

    #[test]
    fn test_view_fields() {
        let desc = description();
        let b = desc.user_type("B").unwrap();
        assert_eq!(b.view_fields("tiny"), Some(vec!["x"]));
        assert_eq!(b.view_fields(DEFAULT_VIEW), Some(vec!["x", "y"]));
        assert_eq!(b.view_fields("huge"), None);
    }

    #[test]
    fn test_from_json_reports_position() {
        let err = Description::from_json("{\"name\": }").unwrap_err();
        assert!(matches!(err, GenError::InvalidDescription { line: 1, .. }));
    }
}
