//! Attribute tree: the typed, validated nodes of a service description.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Validation;

/// Scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Boolean,
    Int,
    Int32,
    Int64,
    #[serde(rename = "uint")]
    UInt,
    #[serde(rename = "uint32")]
    UInt32,
    #[serde(rename = "uint64")]
    UInt64,
    Float32,
    Float64,
    String,
    Bytes,
    Any,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Int => "int",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::UInt => "uint",
            Primitive::UInt32 => "uint32",
            Primitive::UInt64 => "uint64",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::String => "string",
            Primitive::Bytes => "bytes",
            Primitive::Any => "any",
        }
    }

    /// Bytes and any carry their own "absent" value and are never wrapped.
    pub fn is_self_nullable(self) -> bool {
        matches!(self, Primitive::Bytes | Primitive::Any)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Primitive::Int
                | Primitive::Int32
                | Primitive::Int64
                | Primitive::UInt
                | Primitive::UInt32
                | Primitive::UInt64
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Primitive::UInt | Primitive::UInt32 | Primitive::UInt64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Primitive::Float32 | Primitive::Float64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Whether values of this type can be copied instead of cloned.
    pub fn is_copy(self) -> bool {
        !matches!(self, Primitive::String | Primitive::Bytes | Primitive::Any)
    }

    /// Inclusive range of the Rust integer type this primitive maps to.
    pub fn integer_range(self) -> Option<(i128, i128)> {
        match self {
            Primitive::Int | Primitive::Int64 => Some((i64::MIN.into(), i64::MAX.into())),
            Primitive::Int32 => Some((i32::MIN.into(), i32::MAX.into())),
            Primitive::UInt | Primitive::UInt64 => Some((0, u64::MAX.into())),
            Primitive::UInt32 => Some((0, u32::MAX.into())),
            _ => None,
        }
    }

    /// Whether a JSON value is a literal of this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Primitive::Boolean => value.is_boolean(),
            Primitive::String => value.is_string(),
            Primitive::Float64 => value.is_number(),
            Primitive::Float32 => value.as_f64().is_some_and(|f| f.abs() <= f64::from(f32::MAX)),
            Primitive::Bytes => value
                .as_array()
                .is_some_and(|bytes| bytes.iter().all(|b| b.as_u64().is_some_and(|b| b <= 255))),
            Primitive::Any => true,
            _ => {
                let n = value
                    .as_i64()
                    .map(i128::from)
                    .or_else(|| value.as_u64().map(i128::from));
                match (self.integer_range(), n) {
                    (Some((lo, hi)), Some(n)) => lo <= n && n <= hi,
                    _ => false,
                }
            }
        }
    }

    /// Whether this type may be used as a map key.
    pub fn is_key(self) -> bool {
        self.is_integer() || matches!(self, Primitive::String | Primitive::Boolean)
    }
}

/// Where a top-level payload field travels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    #[default]
    Body,
    Path,
    Query,
    Header,
    Cookie,
}

impl Location {
    pub fn name(self) -> &'static str {
        match self {
            Location::Body => "body",
            Location::Path => "path",
            Location::Query => "query",
            Location::Header => "header",
            Location::Cookie => "cookie",
        }
    }
}

/// The closed set of attribute kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeKind {
    Primitive { name: Primitive },
    Object { fields: Vec<Field> },
    Array { element: Box<Attribute> },
    Map { key: Box<Attribute>, value: Box<Attribute> },
    /// Reference to a named user type.
    UserType { name: String },
    /// Reference to a user type projected through one of its views.
    View { name: String, view: String },
}

/// A named field of an object attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub attribute: Attribute,
}

/// A node of the schema tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub kind: AttributeKind,

    /// Names of the required fields (objects only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(default, skip_serializing_if = "Validation::is_empty")]
    pub validation: Validation,

    /// Transport location, only read on the fields of a method payload.
    #[serde(default)]
    pub location: Location,

    /// Name used on the wire when it differs from the field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Attribute {
    pub fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            required: Vec::new(),
            validation: Validation::default(),
            location: Location::Body,
            wire_name: None,
            default: None,
            description: None,
        }
    }

    pub fn primitive(name: Primitive) -> Self {
        Self::new(AttributeKind::Primitive { name })
    }

    pub fn object(fields: impl IntoIterator<Item = (&'static str, Attribute)>) -> Self {
        Self::new(AttributeKind::Object {
            fields: fields
                .into_iter()
                .map(|(name, attribute)| Field {
                    name: name.to_string(),
                    attribute,
                })
                .collect(),
        })
    }

    pub fn array(element: Attribute) -> Self {
        Self::new(AttributeKind::Array {
            element: Box::new(element),
        })
    }

    pub fn map(key: Attribute, value: Attribute) -> Self {
        Self::new(AttributeKind::Map {
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    pub fn user_type(name: impl Into<String>) -> Self {
        Self::new(AttributeKind::UserType { name: name.into() })
    }

    pub fn view(name: impl Into<String>, view: impl Into<String>) -> Self {
        Self::new(AttributeKind::View {
            name: name.into(),
            view: view.into(),
        })
    }

    pub fn with_required(mut self, names: impl IntoIterator<Item = &'static str>) -> Self {
        self.required = names.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_wire_name(mut self, name: impl Into<String>) -> Self {
        self.wire_name = Some(name.into());
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Fields of an object attribute, in declared order.
    pub fn fields(&self) -> &[Field] {
        match &self.kind {
            AttributeKind::Object { fields } => fields,
            _ => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().iter().find(|f| f.name == name)
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required.iter().any(|r| r == field)
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match &self.kind {
            AttributeKind::Primitive { name } => Some(*name),
            _ => None,
        }
    }

    /// Name of the referenced user type, for references and views.
    pub fn type_reference(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::UserType { name } | AttributeKind::View { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }
}

impl Field {
    /// Name carried on the wire.
    pub fn wire_name(&self) -> &str {
        self.attribute.wire_name.as_deref().unwrap_or(&self.name)
    }

    pub fn location(&self) -> Location {
        self.attribute.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_attribute() {
        let json = r#"{
            "type": { "kind": "object", "fields": [
                { "name": "id", "attribute": { "type": { "kind": "primitive", "name": "uint" }, "location": "path" } },
                { "name": "body", "attribute": { "type": { "kind": "primitive", "name": "string" }, "wire_name": "b" } },
                { "name": "tags", "attribute": { "type": { "kind": "array", "element": { "type": { "kind": "primitive", "name": "string" } } } } }
            ] },
            "required": ["id"]
        }"#;
        let attr: Attribute = serde_json::from_str(json).unwrap();

        let names: Vec<_> = attr.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "body", "tags"]);
        assert_eq!(attr.fields()[0].location(), Location::Path);
        assert_eq!(attr.fields()[0].attribute.as_primitive(), Some(Primitive::UInt));
        assert_eq!(attr.fields()[1].wire_name(), "b");
        assert_eq!(attr.fields()[2].wire_name(), "tags");
        assert!(attr.is_required("id"));
        assert!(!attr.is_required("body"));
    }

    #[test]
    fn test_primitive_accepts_literals() {
        use serde_json::json;

        assert!(Primitive::Int32.accepts(&json!(-5)));
        assert!(!Primitive::Int32.accepts(&json!(3_000_000_000u64)));
        assert!(!Primitive::Int.accepts(&json!("ten")));
        assert!(!Primitive::Int.accepts(&json!(1.5)));
        assert!(Primitive::UInt64.accepts(&json!(u64::MAX)));
        assert!(!Primitive::UInt.accepts(&json!(-1)));
        assert!(Primitive::Float64.accepts(&json!(2)));
        assert!(!Primitive::Float32.accepts(&json!(1e40)));
        assert!(Primitive::Bytes.accepts(&json!([0, 255])));
        assert!(!Primitive::Bytes.accepts(&json!([256])));
        assert!(!Primitive::Boolean.accepts(&json!(1)));
        assert!(Primitive::Any.accepts(&json!({ "a": [1] })));
    }

    #[test]
    fn test_primitive_classification() {
        assert!(Primitive::Bytes.is_self_nullable());
        assert!(Primitive::Any.is_self_nullable());
        assert!(!Primitive::String.is_self_nullable());
        assert!(Primitive::UInt32.is_unsigned());
        assert!(Primitive::Float32.is_numeric());
        assert!(!Primitive::String.is_copy());
        assert!(!Primitive::Float64.is_key());
    }
}
