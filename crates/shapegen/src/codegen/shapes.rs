//! Body shape synthesis.
//!
//! Derives the wire representation of every request, response and error
//! body of a service from the attribute tree. Shapes live in an arena keyed
//! by their final type name; fields refer to other shapes by name, so
//! recursive user types are expressed without ownership cycles.

use std::collections::HashMap;

use crate::diagnostic::GenError;
use crate::ir::{Attribute, AttributeKind, Description, Location, Method, Primitive, Service, DEFAULT_VIEW};

use super::registry::{ArtifactKey, NameRegistry, Role};
use super::rust_types::to_pascal_case;

/// Reference from a field to its wire type.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeRef {
    Primitive(Primitive),
    /// A generated record or alias, by type name.
    Named(String),
    Array(Box<ShapeRef>),
    Map(Primitive, Box<ShapeRef>),
}

/// How a value sits in its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Held directly; always present.
    Value,
    /// May be absent: `Option<T>`, or `Option<Box<T>>` for records.
    Optional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeField {
    /// Declared field name.
    pub name: String,
    pub wire_name: String,
    pub shape: ShapeRef,
    pub slot: Slot,
    pub required: bool,
    /// Declared attribute of the field, carrying its rules and default.
    pub attribute: Attribute,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Record(Vec<ShapeField>),
    /// Named collection type.
    Alias(ShapeRef),
}

/// A generated body type.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub name: String,
    pub role: Role,
    pub kind: ShapeKind,
    /// Resolved attribute the shape was built from.
    pub attribute: Attribute,
    /// Set on method-level bodies.
    pub owner: Option<Owner>,
    pub description: Option<String>,
}

/// The method body a top-level shape was generated for.
#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    pub method: String,
    pub kind: BodyKind,
}

impl Shape {
    pub fn is_top_level(&self) -> bool {
        self.owner.is_some()
    }

    pub fn fields(&self) -> &[ShapeField] {
        match &self.kind {
            ShapeKind::Record(fields) => fields,
            ShapeKind::Alias(_) => &[],
        }
    }
}

/// All body types of one service.
#[derive(Debug, Default)]
pub struct ShapeArena {
    shapes: Vec<Shape>,
    index: HashMap<String, usize>,
}

impl ShapeArena {
    pub fn get(&self, name: &str) -> Option<&Shape> {
        self.index.get(name).map(|&i| &self.shapes[i])
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Shapes in emission order: method-level bodies first, then nested
    /// types in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Shape> {
        let top = self.shapes.iter().filter(|s| s.is_top_level());
        top.chain(self.shapes.iter().filter(|s| !s.is_top_level()))
    }

    /// Whether values of `shape` are held directly rather than wrapped.
    pub fn is_collection_like(&self, shape: &ShapeRef) -> bool {
        match shape {
            ShapeRef::Primitive(p) => p.is_self_nullable(),
            ShapeRef::Array(_) | ShapeRef::Map(..) => true,
            ShapeRef::Named(name) => {
                matches!(self.get(name).map(|s| &s.kind), Some(ShapeKind::Alias(_)))
            }
        }
    }

    fn push(&mut self, shape: Shape) -> usize {
        let i = self.shapes.len();
        self.index.insert(shape.name.clone(), i);
        self.shapes.push(shape);
        i
    }
}

/// Which body of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyKind {
    Request,
    /// Success response, optionally rendered through a view.
    Response { view: Option<String> },
    Error { name: String },
}

/// A method-level body.
#[derive(Debug, Clone, PartialEq)]
pub struct TopBody {
    pub kind: BodyKind,
    /// `None` when nothing travels in the body.
    pub shape: Option<ShapeRef>,
    /// Declared payload, result or error attribute.
    pub attribute: Attribute,
    /// Whether the domain side is a projected view type.
    pub projected: bool,
}

impl TopBody {
    pub fn view(&self) -> Option<&str> {
        match &self.kind {
            BodyKind::Response { view } => view.as_deref(),
            _ => None,
        }
    }
}

/// The bodies of one method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodShapes {
    pub method: String,
    pub request: Option<TopBody>,
    pub responses: Vec<TopBody>,
    pub errors: Vec<TopBody>,
}

/// Synthesizes every body shape of `service`.
///
/// Method-level names are reserved before any nested type is visited so
/// they never depend on which user types a service happens to reference.
pub fn synthesize_service(
    desc: &Description,
    service: &Service,
    registry: &mut NameRegistry,
) -> Result<(ShapeArena, Vec<MethodShapes>), GenError> {
    let mut plans = Vec::new();
    for method in &service.methods {
        for plan in plan_bodies(desc, method)? {
            let name = plan
                .candidate
                .as_ref()
                .map(|candidate| registry.reserve(candidate, ""));
            plans.push((method, plan, name));
        }
    }

    let mut builder = ShapeBuilder {
        desc,
        registry,
        arena: ShapeArena::default(),
    };
    let mut methods: Vec<MethodShapes> = Vec::new();
    for (method, plan, name) in plans {
        let shape = builder.build_top(method, &plan, name)?;
        let body = TopBody {
            kind: plan.kind,
            shape,
            attribute: plan.attribute.clone(),
            projected: plan.projection.is_some(),
        };

        if methods.last().is_none_or(|m| m.method != method.name) {
            methods.push(MethodShapes {
                method: method.name.clone(),
                request: None,
                responses: Vec::new(),
                errors: Vec::new(),
            });
        }
        let Some(entry) = methods.last_mut() else {
            continue;
        };
        match body.kind {
            BodyKind::Request => entry.request = Some(body),
            BodyKind::Response { .. } => entry.responses.push(body),
            BodyKind::Error { .. } => entry.errors.push(body),
        }
    }

    Ok((builder.arena, methods))
}

/// A method-level body before its shape is built.
struct BodyPlan<'d> {
    kind: BodyKind,
    attribute: &'d Attribute,
    /// Type name and view the body is projected through.
    projection: Option<(&'d str, String)>,
    /// Candidate type name, when the body needs a named type.
    candidate: Option<String>,
}

fn plan_bodies<'d>(desc: &'d Description, method: &'d Method) -> Result<Vec<BodyPlan<'d>>, GenError> {
    let base = to_pascal_case(&method.name);
    let mut plans = Vec::new();

    if let Some(payload) = &method.payload {
        plans.push(plan(desc, BodyKind::Request, payload, None, format!("{base}RequestBody"))?);
    }

    if let Some(result) = &method.result {
        match &result.kind {
            AttributeKind::View { name, view } => {
                let projection = Some((name.as_str(), view.clone()));
                plans.push(plan(
                    desc,
                    BodyKind::Response { view: None },
                    result,
                    projection,
                    format!("{base}ResponseBody"),
                )?);
            }
            AttributeKind::UserType { name } if has_views(desc, name) => {
                for view in view_names(desc, name) {
                    let suffix = if view == DEFAULT_VIEW {
                        String::new()
                    } else {
                        to_pascal_case(&view)
                    };
                    plans.push(plan(
                        desc,
                        BodyKind::Response { view: Some(view.clone()) },
                        result,
                        Some((name.as_str(), view)),
                        format!("{base}ResponseBody{suffix}"),
                    )?);
                }
            }
            _ => plans.push(plan(
                desc,
                BodyKind::Response { view: None },
                result,
                None,
                format!("{base}ResponseBody"),
            )?),
        }
    }

    for error in &method.errors {
        let error_base = to_pascal_case(&error.name);
        plans.push(plan(
            desc,
            BodyKind::Error { name: error.name.clone() },
            &error.attribute,
            None,
            format!("{base}{error_base}ResponseBody"),
        )?);
    }

    Ok(plans)
}

fn plan<'d>(
    desc: &'d Description,
    kind: BodyKind,
    attribute: &'d Attribute,
    projection: Option<(&'d str, String)>,
    candidate: String,
) -> Result<BodyPlan<'d>, GenError> {
    let resolved = resolve(desc, attribute, &candidate)?;
    let named = match &resolved.kind {
        AttributeKind::Primitive { .. } => false,
        AttributeKind::Object { .. } => desc.has_body_fields(resolved),
        _ => true,
    };
    Ok(BodyPlan {
        kind,
        attribute,
        projection,
        candidate: named.then_some(candidate),
    })
}

fn has_views(desc: &Description, type_name: &str) -> bool {
    desc.user_type(type_name).is_some_and(|t| t.has_views())
}

/// Views a result type is rendered through: the default view first, then
/// the declared ones in order.
fn view_names(desc: &Description, type_name: &str) -> Vec<String> {
    let mut names = vec![DEFAULT_VIEW.to_string()];
    if let Some(user_type) = desc.user_type(type_name) {
        names.extend(
            user_type
                .views
                .iter()
                .filter(|v| v.name != DEFAULT_VIEW)
                .map(|v| v.name.clone()),
        );
    }
    names
}

fn resolve<'d>(desc: &'d Description, attr: &'d Attribute, site: &str) -> Result<&'d Attribute, GenError> {
    desc.resolve(attr).ok_or_else(|| GenError::Unresolved {
        name: attr.type_reference().unwrap_or("?").to_string(),
        site: site.to_string(),
    })
}

struct ShapeBuilder<'a> {
    desc: &'a Description,
    registry: &'a mut NameRegistry,
    arena: ShapeArena,
}

impl ShapeBuilder<'_> {
    fn build_top(
        &mut self,
        method: &Method,
        plan: &BodyPlan<'_>,
        name: Option<String>,
    ) -> Result<Option<ShapeRef>, GenError> {
        let desc = self.desc;
        let role = match plan.kind {
            BodyKind::Request => Role::Request,
            _ => Role::Response,
        };
        let base = to_pascal_case(&method.name);
        let resolved = resolve(desc, plan.attribute, &method.name)?;

        if let AttributeKind::Primitive { name } = &resolved.kind {
            return Ok(Some(ShapeRef::Primitive(*name)));
        }
        let Some(name) = name else {
            return Ok(None);
        };

        let owner = Owner {
            method: method.name.clone(),
            kind: plan.kind.clone(),
        };
        let projected = plan.projection.is_some();
        let filter = match &plan.projection {
            Some((type_name, view)) => self.view_filter(type_name, view),
            None => None,
        };
        let description = plan.attribute.description.clone().or_else(|| {
            plan.attribute
                .type_reference()
                .and_then(|t| desc.user_type(t))
                .and_then(|t| t.description.clone())
        });

        match &resolved.kind {
            AttributeKind::Object { .. } => {
                let i = self.arena.push(Shape {
                    name: name.clone(),
                    role,
                    kind: ShapeKind::Record(Vec::new()),
                    attribute: resolved.clone(),
                    owner: Some(owner),
                    description,
                });
                let fields = self.record_fields(resolved, role, filter.as_deref(), true, &base, projected)?;
                self.arena.shapes[i].kind = ShapeKind::Record(fields);
            }
            _ => {
                let target = self.shape_of(resolved, role, &base, projected)?;
                self.arena.push(Shape {
                    name: name.clone(),
                    role,
                    kind: ShapeKind::Alias(target),
                    attribute: resolved.clone(),
                    owner: Some(owner),
                    description,
                });
            }
        }
        Ok(Some(ShapeRef::Named(name)))
    }

    /// Fields exposed by `view` of `type_name`, or `None` when the view
    /// exposes every field.
    fn view_filter(&self, type_name: &str, view: &str) -> Option<Vec<String>> {
        let user_type = self.desc.user_type(type_name)?;
        let def = user_type.view(view)?;
        let all = self.desc.resolve(&user_type.attribute).map_or(0, |a| a.fields().len());
        (def.fields.len() != all).then(|| def.fields.clone())
    }

    fn record_fields(
        &mut self,
        attr: &Attribute,
        role: Role,
        filter: Option<&[String]>,
        body_only: bool,
        base: &str,
        projected: bool,
    ) -> Result<Vec<ShapeField>, GenError> {
        let mut fields = Vec::new();
        for field in attr.fields() {
            if body_only && field.location() != Location::Body {
                continue;
            }
            if filter.is_some_and(|names| !names.iter().any(|n| *n == field.name)) {
                continue;
            }
            let path = format!("{base}{}", to_pascal_case(&field.name));
            let shape = self.shape_of(&field.attribute, role, &path, projected)?;
            let required = attr.is_required(&field.name);
            let slot = self.slot(role, required, &shape);
            fields.push(ShapeField {
                name: field.name.clone(),
                wire_name: field.wire_name().to_string(),
                shape,
                slot,
                required,
                attribute: field.attribute.clone(),
            });
        }
        Ok(fields)
    }

    /// Request bodies keep every field optional so absence can be detected;
    /// response bodies hold required primitives directly.
    fn slot(&self, role: Role, required: bool, shape: &ShapeRef) -> Slot {
        if self.arena.is_collection_like(shape) {
            return Slot::Value;
        }
        match (shape, role) {
            (ShapeRef::Primitive(_), Role::Response) if required => Slot::Value,
            _ => Slot::Optional,
        }
    }

    fn shape_of(
        &mut self,
        attr: &Attribute,
        role: Role,
        path: &str,
        projected: bool,
    ) -> Result<ShapeRef, GenError> {
        match &attr.kind {
            AttributeKind::Primitive { name } => Ok(ShapeRef::Primitive(*name)),
            AttributeKind::Array { element } => {
                let element = self.shape_of(element, role, path, projected)?;
                Ok(ShapeRef::Array(Box::new(element)))
            }
            AttributeKind::Map { key, value } => {
                let key = resolve(self.desc, key, path)?
                    .as_primitive()
                    .ok_or_else(|| GenError::Unresolved {
                        name: "map key".to_string(),
                        site: path.to_string(),
                    })?;
                let value = self.shape_of(value, role, path, projected)?;
                Ok(ShapeRef::Map(key, Box::new(value)))
            }
            AttributeKind::Object { .. } => {
                let name = self.registry.reserve(&format!("{path}{}", role.suffix()), "");
                let i = self.arena.push(Shape {
                    name: name.clone(),
                    role,
                    kind: ShapeKind::Record(Vec::new()),
                    attribute: attr.clone(),
                    owner: None,
                    description: attr.description.clone(),
                });
                let fields = self.record_fields(attr, role, None, false, path, projected)?;
                self.arena.shapes[i].kind = ShapeKind::Record(fields);
                Ok(ShapeRef::Named(name))
            }
            AttributeKind::UserType { name } => self.user_type_shape(name, None, role, path, projected),
            AttributeKind::View { name, view } => {
                self.user_type_shape(name, Some(view), role, path, true)
            }
        }
    }

    fn user_type_shape(
        &mut self,
        type_name: &str,
        view: Option<&str>,
        role: Role,
        path: &str,
        projected: bool,
    ) -> Result<ShapeRef, GenError> {
        let desc = self.desc;
        let user_type = desc.user_type(type_name).ok_or_else(|| GenError::Unresolved {
            name: type_name.to_string(),
            site: path.to_string(),
        })?;
        let resolved = resolve(desc, &user_type.attribute, path)?;
        if let AttributeKind::Primitive { name } = &resolved.kind {
            return Ok(ShapeRef::Primitive(*name));
        }

        let view_name = view.unwrap_or(DEFAULT_VIEW);
        let filter = if projected {
            self.view_filter(type_name, view_name)
        } else {
            None
        };
        let key_view = filter.as_ref().map(|_| view_name.to_string());
        let base = to_pascal_case(type_name);
        let view_suffix = key_view.as_deref().map(to_pascal_case).unwrap_or_default();
        let candidate = format!("{base}{}{view_suffix}", role.suffix());
        let key = ArtifactKey::Shape {
            type_name: type_name.to_string(),
            role,
            view: key_view,
        };

        let (name, exists) = self.registry.lookup_or_reserve(key, &candidate, path);
        if exists {
            return Ok(ShapeRef::Named(name));
        }

        let shape = Shape {
            name: name.clone(),
            role,
            kind: ShapeKind::Record(Vec::new()),
            attribute: resolved.clone(),
            owner: None,
            description: user_type.description.clone(),
        };
        match &resolved.kind {
            AttributeKind::Object { .. } => {
                let i = self.arena.push(shape);
                let fields = self.record_fields(resolved, role, filter.as_deref(), false, &base, projected)?;
                self.arena.shapes[i].kind = ShapeKind::Record(fields);
            }
            _ => {
                let i = self.arena.push(Shape {
                    kind: ShapeKind::Alias(ShapeRef::Primitive(Primitive::Any)),
                    ..shape
                });
                let target = self.shape_of(resolved, role, &base, projected)?;
                self.arena.shapes[i].kind = ShapeKind::Alias(target);
            }
        }
        Ok(ShapeRef::Named(name))
    }
}
