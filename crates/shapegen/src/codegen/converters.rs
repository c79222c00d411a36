//! Conversion plans between body types and domain types.
//!
//! A [`Constructor`] builds a domain payload from a decoded request body
//! and the non-body parameters, or builds a response/error body from a
//! domain result. Nested records are converted by [`Helper`] functions,
//! shared by every conversion of the same body/domain pair.

use serde_json::Value;

use crate::diagnostic::GenError;
use crate::ir::{Attribute, AttributeKind, Description, Location, Primitive, Service, DEFAULT_VIEW};

use super::registry::{ArtifactKey, Direction, NameRegistry};
use super::rust_types::{primitive_type, rust_ident, to_pascal_case, to_snake_case};
use super::shapes::{BodyKind, MethodShapes, ShapeArena, ShapeKind, ShapeRef, Slot, TopBody};

/// Module paths the generated code refers to for domain types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPaths {
    /// Module holding the service's payload, result and user types.
    pub service: String,
    /// Module holding the view-projected result types.
    pub views: String,
}

impl DomainPaths {
    pub fn new(domain_module: &str, views_module: &str, service: &Service) -> Self {
        let service = format!("{domain_module}::{}", rust_ident(&service.name));
        let views = format!("{service}::{views_module}");
        Self { service, views }
    }
}

/// Per-value conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Copy(Primitive),
    /// Conversion through a helper function.
    Helper(String),
    Elements(Box<Transform>),
    Entries { key: Primitive, value: Box<Transform> },
}

/// How a value moves from its source slot to its target slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub from: Slot,
    pub to: Slot,
    pub transform: Transform,
    /// Substituted when an optional source is absent and the target is not.
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A field of the converted value.
    Field,
    /// A constructor parameter carrying a non-body field.
    Param,
}

/// One field of a built record.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Declared field name, used on the domain side.
    pub field: String,
    pub wire_name: String,
    pub source: Source,
    pub conversion: Conversion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Build {
    /// A struct literal of `target`.
    Record { target: String, fields: Vec<Assignment> },
    /// A direct conversion of the whole source value.
    Value(Conversion),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Helper {
    pub name: String,
    pub direction: Direction,
    /// Wire type name.
    pub body: String,
    /// Domain type path.
    pub domain: String,
    pub build: Build,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstructorKind {
    Payload,
    Response { view: Option<String> },
    Error { name: String },
}

/// A non-body payload field passed to a payload constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    /// A primitive or an array of primitives.
    pub shape: ShapeRef,
    pub slot: Slot,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constructor {
    pub name: String,
    pub method: String,
    pub kind: ConstructorKind,
    /// Body type; `None` for payloads that travel entirely outside the body.
    pub body: Option<ShapeRef>,
    /// Domain type, as a Rust type expression.
    pub domain: String,
    pub params: Vec<Param>,
    pub build: Build,
}

/// All conversions of one service.
#[derive(Debug, Default)]
pub struct Conversions {
    pub constructors: Vec<Constructor>,
    pub helpers: Vec<Helper>,
}

impl Conversions {
    pub fn helper(&self, name: &str) -> Option<&Helper> {
        self.helpers.iter().find(|h| h.name == name)
    }
}

/// Plans every constructor and helper of a service.
pub fn synthesize_conversions(
    desc: &Description,
    arena: &ShapeArena,
    methods: &[MethodShapes],
    registry: &mut NameRegistry,
    paths: &DomainPaths,
) -> Result<Conversions, GenError> {
    let mut builder = ConversionBuilder {
        desc,
        arena,
        registry,
        paths,
        helpers: Vec::new(),
    };
    let mut constructors = Vec::new();

    // Response and error builders come before payload constructors.
    for method in methods {
        for response in &method.responses {
            if let Some(c) = builder.response(&method.method, response)? {
                constructors.push(c);
            }
        }
        for error in &method.errors {
            if let Some(c) = builder.response(&method.method, error)? {
                constructors.push(c);
            }
        }
    }
    for method in methods {
        if let Some(request) = &method.request {
            constructors.push(builder.payload(&method.method, request)?);
        }
    }

    Ok(Conversions {
        constructors,
        helpers: builder.helpers,
    })
}

struct ConversionBuilder<'a> {
    desc: &'a Description,
    arena: &'a ShapeArena,
    registry: &'a mut NameRegistry,
    paths: &'a DomainPaths,
    helpers: Vec<Helper>,
}

impl ConversionBuilder<'_> {
    fn payload(&mut self, method: &str, request: &TopBody) -> Result<Constructor, GenError> {
        let arena = self.arena;
        let base = format!("{}Payload", to_pascal_case(method));
        let resolved = resolve(self.desc, &request.attribute, method)?;
        let domain = self.domain_type(&request.attribute, &base, false);

        let type_base = request
            .attribute
            .type_reference()
            .map(to_pascal_case)
            .unwrap_or_else(|| base.clone());
        let method_snake = to_snake_case(&to_pascal_case(method));
        let type_snake = to_snake_case(&type_base);
        let candidate = if type_snake.starts_with(&method_snake) {
            format!("new_{type_snake}")
        } else {
            format!("new_{method_snake}_{type_snake}")
        };
        let name = self.registry.reserve(&candidate, "");

        let mut params = Vec::new();
        let build = match (&resolved.kind, &request.shape) {
            (AttributeKind::Object { fields }, shape) => {
                let field_base = request
                    .attribute
                    .type_reference()
                    .map(to_pascal_case)
                    .unwrap_or_else(|| base.clone());
                let body_fields = match shape {
                    Some(ShapeRef::Named(body)) => arena.get(body).map(|s| s.fields()),
                    _ => None,
                };
                let mut assignments = Vec::new();
                for field in fields {
                    let required = resolved.is_required(&field.name);
                    let default = field.attribute.default.clone();

                    if field.location() != Location::Body {
                        let shape = self.param_shape(&field.attribute, &field.name)?;
                        let slot = if matches!(shape, ShapeRef::Array(_)) || required || default.is_some() {
                            Slot::Value
                        } else {
                            Slot::Optional
                        };
                        let transform = match &shape {
                            ShapeRef::Array(element) => match element.as_ref() {
                                ShapeRef::Primitive(p) => Transform::Elements(Box::new(Transform::Copy(*p))),
                                _ => Transform::Copy(Primitive::Any),
                            },
                            ShapeRef::Primitive(p) => Transform::Copy(*p),
                            _ => Transform::Copy(Primitive::Any),
                        };
                        params.push(Param {
                            name: field.name.clone(),
                            shape,
                            slot,
                            location: field.location(),
                        });
                        assignments.push(Assignment {
                            field: field.name.clone(),
                            wire_name: field.wire_name().to_string(),
                            source: Source::Param,
                            conversion: Conversion {
                                from: slot,
                                to: slot,
                                transform,
                                default,
                            },
                        });
                        continue;
                    }

                    let Some(wire) = body_fields.and_then(|fs| fs.iter().find(|f| f.name == field.name)) else {
                        continue;
                    };
                    let path = format!("{field_base}{}", to_pascal_case(&field.name));
                    let transform =
                        self.transform(Direction::Unmarshal, &field.attribute, &wire.shape, &path, false)?;
                    let to = self.domain_slot(&wire.shape, required, default.is_some(), false);
                    assignments.push(Assignment {
                        field: field.name.clone(),
                        wire_name: wire.wire_name.clone(),
                        source: Source::Field,
                        conversion: Conversion {
                            from: wire.slot,
                            to,
                            transform,
                            default,
                        },
                    });
                }
                Build::Record {
                    target: domain.clone(),
                    fields: assignments,
                }
            }
            (_, Some(shape)) => {
                let target = match shape {
                    ShapeRef::Named(name) => match arena.get(name).map(|s| &s.kind) {
                        Some(ShapeKind::Alias(target)) => target.clone(),
                        _ => shape.clone(),
                    },
                    _ => shape.clone(),
                };
                let transform = self.transform(Direction::Unmarshal, resolved, &target, &base, false)?;
                Build::Value(Conversion {
                    from: Slot::Value,
                    to: Slot::Value,
                    transform,
                    default: None,
                })
            }
            (_, None) => {
                return Err(GenError::CodegenFailed {
                    message: format!("payload of method {method} has no body"),
                });
            }
        };
        Ok(Constructor {
            name,
            method: method.to_string(),
            kind: ConstructorKind::Payload,
            body: request.shape.clone(),
            domain,
            params,
            build,
        })
    }

    fn response(&mut self, method: &str, body: &TopBody) -> Result<Option<Constructor>, GenError> {
        let Some(shape) = &body.shape else {
            return Ok(None);
        };
        let method_pascal = to_pascal_case(method);
        let method_snake = to_snake_case(&method_pascal);
        let (kind, base, candidate) = match &body.kind {
            BodyKind::Error { name } => (
                ConstructorKind::Error { name: name.clone() },
                format!("{method_pascal}{}Error", to_pascal_case(name)),
                format!("new_{method_snake}_{}_response_body", to_snake_case(&to_pascal_case(name))),
            ),
            BodyKind::Response { view } => {
                let suffix = match view.as_deref() {
                    Some(v) if v != DEFAULT_VIEW => format!("_{}", to_snake_case(&to_pascal_case(v))),
                    _ => String::new(),
                };
                (
                    ConstructorKind::Response { view: view.clone() },
                    format!("{method_pascal}Result"),
                    format!("new_{method_snake}_response_body{suffix}"),
                )
            }
            BodyKind::Request => {
                return Err(GenError::CodegenFailed {
                    message: format!("request body of {method} planned as a response"),
                });
            }
        };
        let name = self.registry.reserve(&candidate, "");
        let arena = self.arena;
        let projected = body.projected;
        let resolved = resolve(self.desc, &body.attribute, method)?;
        let domain = self.domain_type(&body.attribute, &base, projected);

        let build = match shape {
            ShapeRef::Named(body_name) => match arena.get(body_name).map(|s| &s.kind) {
                Some(ShapeKind::Record(_)) => {
                    let field_base = body
                        .attribute
                        .type_reference()
                        .map(to_pascal_case)
                        .unwrap_or_else(|| base.clone());
                    let fields = self.record_assignments(
                        Direction::Marshal,
                        body_name,
                        resolved,
                        &field_base,
                        projected,
                    )?;
                    Build::Record {
                        target: body_name.clone(),
                        fields,
                    }
                }
                Some(ShapeKind::Alias(target)) => {
                    let target = target.clone();
                    let transform = self.transform(Direction::Marshal, resolved, &target, &base, projected)?;
                    Build::Value(Conversion {
                        from: Slot::Value,
                        to: Slot::Value,
                        transform,
                        default: None,
                    })
                }
                None => {
                    return Err(GenError::Unresolved {
                        name: body_name.clone(),
                        site: format!("method {method}"),
                    });
                }
            },
            _ => {
                let transform = self.transform(Direction::Marshal, resolved, shape, &base, projected)?;
                Build::Value(Conversion {
                    from: Slot::Value,
                    to: Slot::Value,
                    transform,
                    default: None,
                })
            }
        };

        Ok(Some(Constructor {
            name,
            method: method.to_string(),
            kind,
            body: Some(shape.clone()),
            domain,
            params: Vec::new(),
            build,
        }))
    }

    /// Field assignments converting between record `body_name` and the
    /// domain record described by `resolved`.
    fn record_assignments(
        &mut self,
        direction: Direction,
        body_name: &str,
        resolved: &Attribute,
        base: &str,
        projected: bool,
    ) -> Result<Vec<Assignment>, GenError> {
        let arena = self.arena;
        let Some(shape) = arena.get(body_name) else {
            return Err(GenError::Unresolved {
                name: body_name.to_string(),
                site: base.to_string(),
            });
        };
        let mut assignments = Vec::new();
        for wire in shape.fields() {
            let required = resolved.is_required(&wire.name);
            let default = wire.attribute.default.clone();
            let path = format!("{base}{}", to_pascal_case(&wire.name));
            let transform = self.transform(direction, &wire.attribute, &wire.shape, &path, projected)?;
            let domain_slot = self.domain_slot(&wire.shape, required, default.is_some(), projected);
            let (from, to) = match direction {
                Direction::Unmarshal => (wire.slot, domain_slot),
                Direction::Marshal => (domain_slot, wire.slot),
            };
            assignments.push(Assignment {
                field: wire.name.clone(),
                wire_name: wire.wire_name.clone(),
                source: Source::Field,
                conversion: Conversion {
                    from,
                    to,
                    transform,
                    default,
                },
            });
        }
        Ok(assignments)
    }

    fn transform(
        &mut self,
        direction: Direction,
        attr: &Attribute,
        shape: &ShapeRef,
        base: &str,
        projected: bool,
    ) -> Result<Transform, GenError> {
        let resolved = resolve(self.desc, attr, base)?;
        match shape {
            ShapeRef::Primitive(p) => Ok(Transform::Copy(*p)),
            ShapeRef::Array(element) => {
                let AttributeKind::Array { element: element_attr } = &resolved.kind else {
                    return Err(mismatch(base));
                };
                let inner = self.transform(direction, element_attr, element, base, projected)?;
                Ok(Transform::Elements(Box::new(inner)))
            }
            ShapeRef::Map(key, value) => {
                let AttributeKind::Map { value: value_attr, .. } = &resolved.kind else {
                    return Err(mismatch(base));
                };
                let inner = self.transform(direction, value_attr, value, base, projected)?;
                Ok(Transform::Entries {
                    key: *key,
                    value: Box::new(inner),
                })
            }
            ShapeRef::Named(body) => {
                let (projected, inner_base) = match &attr.kind {
                    AttributeKind::View { name, .. } => (true, to_pascal_case(name)),
                    AttributeKind::UserType { name } => (projected, to_pascal_case(name)),
                    _ => (projected, base.to_string()),
                };
                let domain = self.domain_type(attr, base, projected);
                let name = self.helper(direction, body, &domain, resolved, &inner_base, projected)?;
                Ok(Transform::Helper(name))
            }
        }
    }

    fn helper(
        &mut self,
        direction: Direction,
        body: &str,
        domain: &str,
        resolved: &Attribute,
        base: &str,
        projected: bool,
    ) -> Result<String, GenError> {
        let key = ArtifactKey::Helper {
            direction,
            body: body.to_string(),
            domain: domain.to_string(),
        };
        let domain_snake = to_snake_case(super::rust_types::simple_name(domain));
        let body_snake = to_snake_case(body);
        let candidate = match direction {
            Direction::Unmarshal => format!("unmarshal_{body_snake}_to_{domain_snake}"),
            Direction::Marshal => format!("marshal_{domain_snake}_to_{body_snake}"),
        };
        let (name, exists) = self.registry.lookup_or_reserve(key, &candidate, "");
        if exists {
            return Ok(name);
        }

        let i = self.helpers.len();
        self.helpers.push(Helper {
            name: name.clone(),
            direction,
            body: body.to_string(),
            domain: domain.to_string(),
            build: Build::Record {
                target: String::new(),
                fields: Vec::new(),
            },
        });

        let arena = self.arena;
        let build = match arena.get(body).map(|s| &s.kind) {
            Some(ShapeKind::Record(_)) => {
                let fields = self.record_assignments(direction, body, resolved, base, projected)?;
                let target = match direction {
                    Direction::Unmarshal => domain.to_string(),
                    Direction::Marshal => body.to_string(),
                };
                Build::Record { target, fields }
            }
            Some(ShapeKind::Alias(target)) => {
                let transform = self.transform(direction, resolved, target, base, projected)?;
                Build::Value(Conversion {
                    from: Slot::Value,
                    to: Slot::Value,
                    transform,
                    default: None,
                })
            }
            None => {
                return Err(GenError::Unresolved {
                    name: body.to_string(),
                    site: base.to_string(),
                });
            }
        };
        self.helpers[i].build = build;
        Ok(name)
    }

    /// Domain slot of a field: required and defaulted values are held
    /// directly; view types hold every non-collection field optionally.
    fn domain_slot(&self, shape: &ShapeRef, required: bool, has_default: bool, projected: bool) -> Slot {
        if self.arena.is_collection_like(shape) {
            return Slot::Value;
        }
        if projected {
            return Slot::Optional;
        }
        match shape {
            ShapeRef::Primitive(_) if required || has_default => Slot::Value,
            ShapeRef::Named(_) if required => Slot::Value,
            _ => Slot::Optional,
        }
    }

    fn param_shape(&self, attr: &Attribute, field: &str) -> Result<ShapeRef, GenError> {
        let resolved = resolve(self.desc, attr, field)?;
        match &resolved.kind {
            AttributeKind::Primitive { name } => Ok(ShapeRef::Primitive(*name)),
            AttributeKind::Array { element } => {
                let element = resolve(self.desc, element, field)?;
                element
                    .as_primitive()
                    .map(|p| ShapeRef::Array(Box::new(ShapeRef::Primitive(p))))
                    .ok_or_else(|| mismatch(field))
            }
            _ => Err(mismatch(field)),
        }
    }

    /// Rust type expression of the domain value of `attr`.
    fn domain_type(&self, attr: &Attribute, base: &str, projected: bool) -> String {
        match &attr.kind {
            AttributeKind::Primitive { name } => primitive_type(*name).to_string(),
            AttributeKind::Array { element } => {
                format!("Vec<{}>", self.domain_type(element, base, projected))
            }
            AttributeKind::Map { key, value } => {
                let key = self
                    .desc
                    .resolve(key)
                    .and_then(Attribute::as_primitive)
                    .map_or("String", primitive_type);
                format!("BTreeMap<{key}, {}>", self.domain_type(value, base, projected))
            }
            AttributeKind::Object { .. } => self.local_path(base, projected),
            AttributeKind::UserType { name } => match self.desc.resolve(attr).map(|a| &a.kind) {
                Some(AttributeKind::Primitive { name }) => primitive_type(*name).to_string(),
                _ => self.named_path(name, projected),
            },
            AttributeKind::View { name, .. } => self.named_path(name, true),
        }
    }

    fn named_path(&self, type_name: &str, projected: bool) -> String {
        let base = to_pascal_case(type_name);
        if projected {
            return format!("{}::{base}View", self.paths.views);
        }
        let module = self
            .desc
            .user_type(type_name)
            .and_then(|t| t.module.as_deref())
            .unwrap_or(&self.paths.service);
        format!("{module}::{base}")
    }

    fn local_path(&self, base: &str, projected: bool) -> String {
        if projected {
            format!("{}::{base}View", self.paths.views)
        } else {
            format!("{}::{base}", self.paths.service)
        }
    }
}

fn resolve<'d>(desc: &'d Description, attr: &'d Attribute, site: &str) -> Result<&'d Attribute, GenError> {
    desc.resolve(attr).ok_or_else(|| GenError::Unresolved {
        name: attr.type_reference().unwrap_or("?").to_string(),
        site: site.to_string(),
    })
}

fn mismatch(site: &str) -> GenError {
    GenError::CodegenFailed {
        message: format!("body shape and attribute disagree at {site}"),
    }
}
