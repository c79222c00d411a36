//! Generation error types.
#![allow(unused_assignments)]

use std::path::PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur while generating server types.
///
/// All of them are fatal to the generation unit they occur in. `site`
/// fields name the service, method and field path involved, e.g.
/// `service "store" method "add" payload.items[*].sku`.
#[allow(unused_assignments)]
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum GenError {
    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("Failed to access '{path}': {message}")]
    #[diagnostic(code(shapegen::io::access_failed))]
    IoError {
        path: PathBuf,
        message: String,
    },

    // =========================================================================
    // Description Errors
    // =========================================================================
    #[error("Invalid service description at line {line}, column {column}: {message}")]
    #[diagnostic(
        code(shapegen::description::invalid),
        help("The description must be the JSON form of a service description: {{ name, types, services }}")
    )]
    InvalidDescription {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Duplicate {kind} name '{name}'")]
    #[diagnostic(code(shapegen::description::duplicate_name))]
    DuplicateName {
        kind: &'static str,
        name: String,
    },

    #[error("Unknown type reference '{name}' in {site}")]
    #[diagnostic(
        code(shapegen::description::unknown_reference),
        help("Declare the type in the description's `types` list")
    )]
    UnknownTypeReference {
        name: String,
        site: String,
    },

    #[error("Required field '{field}' is not declared in {site}")]
    #[diagnostic(code(shapegen::description::unknown_required_field))]
    UnknownRequiredField {
        field: String,
        site: String,
    },

    #[error("Wire name '{wire_name}' is used by more than one field in {site}")]
    #[diagnostic(
        code(shapegen::description::duplicate_wire_name),
        help("Give one of the fields a different `wire_name`")
    )]
    DuplicateWireName {
        wire_name: String,
        site: String,
    },

    #[error("Field {site} is carried in the {location} but its type is {found}")]
    #[diagnostic(
        code(shapegen::description::invalid_parameter_type),
        help("Path, query, header and cookie fields must be scalars or arrays of scalars")
    )]
    InvalidParameterType {
        location: &'static str,
        found: String,
        site: String,
    },

    #[error("Map key of {site} must be a string, integer or boolean, found {found}")]
    #[diagnostic(code(shapegen::description::invalid_map_key))]
    InvalidMapKey {
        found: String,
        site: String,
    },

    #[error("Type '{type_name}' has no view '{view}' (referenced in {site})")]
    #[diagnostic(code(shapegen::description::unknown_view))]
    UnknownView {
        type_name: String,
        view: String,
        site: String,
    },

    #[error("View '{view}' of type '{type_name}' lists unknown field '{field}'")]
    #[diagnostic(code(shapegen::description::unknown_view_field))]
    UnknownViewField {
        type_name: String,
        view: String,
        field: String,
    },

    #[error("Type '{type_name}' cannot be projected through a view: it is not an object")]
    #[diagnostic(code(shapegen::description::view_on_non_object))]
    ViewOnNonObject {
        type_name: String,
    },

    #[error("{rule} {value} at {site} is not a valid {expected}")]
    #[diagnostic(
        code(shapegen::description::invalid_rule_value),
        help("Enum values and defaults are written into generated code and must be literals of the attribute's type. Defaults are only supported on scalar attributes.")
    )]
    InvalidRuleValue {
        rule: &'static str,
        value: String,
        expected: String,
        site: String,
    },

    #[error("Required fields form a cycle: {chain}")]
    #[diagnostic(
        code(shapegen::description::required_cycle),
        help("A value of these types would be infinitely large. Make one of the fields optional or wrap it in an array or map.")
    )]
    RequiredCycle {
        chain: String,
    },

    #[error("'{name}' in {site} cannot be turned into a Rust identifier")]
    #[diagnostic(
        code(shapegen::description::invalid_name),
        help("Names must start with a letter or underscore and contain only letters, digits, '_', '-', '.' or spaces")
    )]
    InvalidName {
        name: String,
        site: String,
    },

    // =========================================================================
    // Code Generation Errors
    // =========================================================================
    #[error("Unresolvable reference to '{name}' while generating {site}")]
    #[diagnostic(code(shapegen::codegen::unresolved))]
    Unresolved {
        name: String,
        site: String,
    },

    #[error("Failed to generate code: {message}")]
    #[diagnostic(code(shapegen::codegen::generation_failed))]
    CodegenFailed {
        message: String,
    },
}

impl GenError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::IoError {
            path: path.into(),
            message: message.into(),
        }
    }
}
