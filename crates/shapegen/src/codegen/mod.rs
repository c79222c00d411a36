//! Rust server types generation from service descriptions.
//!
//! Each service is one generation unit with its own name registry. A unit
//! runs four passes over the read-only description:
//! - Shapes (wire representation of every request, response and error body)
//! - Validators (missing-field and constraint checks for request bodies)
//! - Converters (payload constructors, response builders, shared helpers)
//! - Render (one `server_types.rs` source file)
//!
//! Units share nothing mutable, so they can run on separate threads.

pub mod converters;
pub mod registry;
pub mod render;
pub mod rust_types;
pub mod shapes;
pub mod validators;

use std::thread;

use tracing::{debug, instrument};

use crate::config::GeneratorConfig;
use crate::diagnostic::GenError;
use crate::ir::{Description, Service};
use converters::{Conversions, DomainPaths};
use registry::NameRegistry;
use render::ServiceFile;
use shapes::{MethodShapes, ShapeArena};
use validators::Validator;

/// Generated Rust code.
pub struct GeneratedCode {
    /// Map of filename to content.
    pub files: Vec<(String, String)>,
}

/// Everything produced for one service.
#[derive(Debug)]
pub struct ServiceArtifacts {
    pub service: String,
    /// Output path relative to the output directory.
    pub path: String,
    pub source: String,
    pub shapes: ShapeArena,
    pub methods: Vec<MethodShapes>,
    pub validators: Vec<Validator>,
    pub conversions: Conversions,
}

impl ServiceArtifacts {
    pub fn method(&self, name: &str) -> Option<&MethodShapes> {
        self.methods.iter().find(|m| m.method == name)
    }

    pub fn validator(&self, name: &str) -> Option<&Validator> {
        self.validators.iter().find(|v| v.name == name)
    }
}

/// Generates the server types of every service in `desc`.
///
/// The description must already have passed validation. When any service
/// fails, the error of the first failing service (in declaration order) is
/// returned and nothing else is.
pub fn generate(desc: &Description, config: &GeneratorConfig) -> Result<Vec<ServiceArtifacts>, GenError> {
    if config.parallel && desc.services.len() > 1 {
        thread::scope(|scope| {
            let handles: Vec<_> = desc
                .services
                .iter()
                .map(|service| scope.spawn(move || generate_service(desc, service, config)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(GenError::CodegenFailed {
                            message: "generation thread panicked".to_string(),
                        })
                    })
                })
                .collect()
        })
    } else {
        desc.services
            .iter()
            .map(|service| generate_service(desc, service, config))
            .collect()
    }
}

/// Generates the server types of one service.
#[instrument(skip_all, fields(service = %service.name))]
pub fn generate_service(
    desc: &Description,
    service: &Service,
    config: &GeneratorConfig,
) -> Result<ServiceArtifacts, GenError> {
    let mut registry = NameRegistry::new();

    let (shapes, methods) = shapes::synthesize_service(desc, service, &mut registry)?;
    debug!(shapes = shapes.len(), "synthesized body shapes");

    let validators = validators::synthesize_validators(desc, &shapes, &methods, &mut registry);
    debug!(validators = validators.len(), "planned validators");

    let paths = DomainPaths::new(&config.domain_module, &config.views_module, service);
    let conversions = converters::synthesize_conversions(desc, &shapes, &methods, &mut registry, &paths)?;
    debug!(
        constructors = conversions.constructors.len(),
        helpers = conversions.helpers.len(),
        "planned conversions"
    );

    let source = render::render_service(&ServiceFile {
        service,
        runtime_crate: &config.runtime_crate,
        shapes: &shapes,
        validators: &validators,
        conversions: &conversions,
    });

    Ok(ServiceArtifacts {
        service: service.name.clone(),
        path: render::service_file_name(service),
        source,
        shapes,
        methods,
        validators,
        conversions,
    })
}

impl From<&[ServiceArtifacts]> for GeneratedCode {
    fn from(artifacts: &[ServiceArtifacts]) -> Self {
        Self {
            files: artifacts
                .iter()
                .map(|a| (a.path.clone(), a.source.clone()))
                .collect(),
        }
    }
}
